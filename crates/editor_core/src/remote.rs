use async_trait::async_trait;

use exercise_api::ExerciseApi;
use shared::{
    domain::ExerciseId,
    error::RemoteFault,
    protocol::{
        AutosaveRequest, AutosaveResponse, ExecuteRequest, ExecuteResponse, FormatRequest,
        FormatResponse, LintRequest, LintResponse, SubmitRequest, SubmitResponse,
    },
};

/// The remote save/lint/format/execute/submit service as the coordinators
/// see it. An `Err` is a transport- or parse-level failure; an envelope with
/// `success: false` comes back as a normal response for policy code to
/// interpret.
#[async_trait]
pub trait RemoteSync: Send + Sync {
    async fn autosave(
        &self,
        exercise_id: ExerciseId,
        request: &AutosaveRequest,
    ) -> Result<AutosaveResponse, RemoteFault>;

    async fn lint(
        &self,
        exercise_id: ExerciseId,
        request: &LintRequest,
    ) -> Result<LintResponse, RemoteFault>;

    async fn format(
        &self,
        exercise_id: ExerciseId,
        request: &FormatRequest,
    ) -> Result<FormatResponse, RemoteFault>;

    async fn execute(
        &self,
        exercise_id: ExerciseId,
        request: &ExecuteRequest,
    ) -> Result<ExecuteResponse, RemoteFault>;

    async fn submit(
        &self,
        exercise_id: ExerciseId,
        request: &SubmitRequest,
    ) -> Result<SubmitResponse, RemoteFault>;
}

#[async_trait]
impl RemoteSync for ExerciseApi {
    async fn autosave(
        &self,
        exercise_id: ExerciseId,
        request: &AutosaveRequest,
    ) -> Result<AutosaveResponse, RemoteFault> {
        ExerciseApi::autosave(self, exercise_id, request)
            .await
            .map_err(|err| err.to_fault())
    }

    async fn lint(
        &self,
        exercise_id: ExerciseId,
        request: &LintRequest,
    ) -> Result<LintResponse, RemoteFault> {
        ExerciseApi::lint(self, exercise_id, request)
            .await
            .map_err(|err| err.to_fault())
    }

    async fn format(
        &self,
        exercise_id: ExerciseId,
        request: &FormatRequest,
    ) -> Result<FormatResponse, RemoteFault> {
        ExerciseApi::format(self, exercise_id, request)
            .await
            .map_err(|err| err.to_fault())
    }

    async fn execute(
        &self,
        exercise_id: ExerciseId,
        request: &ExecuteRequest,
    ) -> Result<ExecuteResponse, RemoteFault> {
        ExerciseApi::execute(self, exercise_id, request)
            .await
            .map_err(|err| err.to_fault())
    }

    async fn submit(
        &self,
        exercise_id: ExerciseId,
        request: &SubmitRequest,
    ) -> Result<SubmitResponse, RemoteFault> {
        ExerciseApi::submit(self, exercise_id, request)
            .await
            .map_err(|err| err.to_fault())
    }
}

/// Null client for hosts that run fully detached from the service.
pub struct DetachedRemote;

#[async_trait]
impl RemoteSync for DetachedRemote {
    async fn autosave(
        &self,
        _exercise_id: ExerciseId,
        _request: &AutosaveRequest,
    ) -> Result<AutosaveResponse, RemoteFault> {
        Err(RemoteFault::transport("remote sync is detached"))
    }

    async fn lint(
        &self,
        _exercise_id: ExerciseId,
        _request: &LintRequest,
    ) -> Result<LintResponse, RemoteFault> {
        Err(RemoteFault::transport("remote sync is detached"))
    }

    async fn format(
        &self,
        _exercise_id: ExerciseId,
        _request: &FormatRequest,
    ) -> Result<FormatResponse, RemoteFault> {
        Err(RemoteFault::transport("remote sync is detached"))
    }

    async fn execute(
        &self,
        _exercise_id: ExerciseId,
        _request: &ExecuteRequest,
    ) -> Result<ExecuteResponse, RemoteFault> {
        Err(RemoteFault::transport("remote sync is detached"))
    }

    async fn submit(
        &self,
        _exercise_id: ExerciseId,
        _request: &SubmitRequest,
    ) -> Result<SubmitResponse, RemoteFault> {
        Err(RemoteFault::transport("remote sync is detached"))
    }
}
