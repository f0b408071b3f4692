//! 리소스 장부 -- 시나리오가 생성한 리소스 기록 및 정리
//!
//! 생성에 성공한 리소스는 즉시 [`ResourceLedger`]에 기록됩니다.
//! [`ResourceLedger::teardown`]은 장부를 소비하므로 한 번만 실행될 수 있으며,
//! 생성의 역순으로 삭제를 시도합니다. 삭제 실패는 재시도하지 않고
//! [`TeardownFailure`]로 보고합니다.
//!
//! 정리되지 않은 채 버려진 장부는 `Drop`에서 에러 로그를 남깁니다.

use std::time::Duration;

use fencecheck_core::metrics as m;
use fencecheck_core::types::ResourceKind;
use tracing::{debug, error, warn};

use crate::cluster::{ControlPlane, ResourceRef};
use crate::error::ConformanceError;
use crate::report::TeardownFailure;
use crate::wait::call_with_timeout;

/// 리소스 하나를 삭제합니다.
///
/// 이미 없는 리소스(`NotFound`)는 삭제된 것으로 취급합니다.
pub async fn delete_resource<C: ControlPlane>(
    control_plane: &C,
    resource: &ResourceRef,
    api_timeout: Duration,
) -> Result<(), ConformanceError> {
    let operation = format!("delete {resource}");
    let result = match resource.kind {
        ResourceKind::Domain => {
            call_with_timeout(
                &operation,
                api_timeout,
                control_plane.delete_domain(&resource.name),
            )
            .await
        }
        ResourceKind::Unit => {
            call_with_timeout(
                &operation,
                api_timeout,
                control_plane.delete_unit(&resource.domain, &resource.name),
            )
            .await
        }
        ResourceKind::Endpoint => {
            call_with_timeout(
                &operation,
                api_timeout,
                control_plane.delete_endpoint(&resource.domain, &resource.name),
            )
            .await
        }
        ResourceKind::Policy => {
            call_with_timeout(
                &operation,
                api_timeout,
                control_plane.delete_policy(&resource.domain, &resource.name),
            )
            .await
        }
    };

    match result {
        Err(ConformanceError::NotFound { .. }) => {
            debug!(resource = %resource, "resource already gone");
            Ok(())
        }
        other => other,
    }
}

/// 시나리오가 생성한 리소스 장부
#[derive(Debug, Default)]
pub struct ResourceLedger {
    /// 생성 순서대로 기록된 리소스
    entries: Vec<ResourceRef>,
    /// 정리 전에 이미 발생한 삭제 실패
    failures: Vec<TeardownFailure>,
}

impl ResourceLedger {
    /// 빈 장부를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 생성된 리소스를 기록합니다.
    pub fn record(&mut self, resource: ResourceRef) {
        debug!(resource = %resource, "recorded resource");
        self.entries.push(resource);
    }

    /// 기록된 리소스 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 기록된 리소스가 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 기록된 리소스 목록을 반환합니다 (생성 순서).
    pub fn entries(&self) -> &[ResourceRef] {
        &self.entries
    }

    /// 리소스를 즉시 삭제하고 장부에서 제거합니다.
    ///
    /// 삭제에 실패하면 실패가 기록되고, 리소스는 다시 삭제를 시도하지 않습니다.
    pub async fn release<C: ControlPlane>(
        &mut self,
        control_plane: &C,
        resource: &ResourceRef,
        api_timeout: Duration,
    ) {
        self.entries.retain(|r| r != resource);
        if let Err(e) = delete_resource(control_plane, resource, api_timeout).await {
            warn!(resource = %resource, error = %e, "failed to release resource");
            self.push_failure(resource.clone(), e.to_string());
        }
    }

    /// 기록된 모든 리소스를 생성 역순으로 삭제합니다.
    ///
    /// 장부를 소비하므로 정리는 한 번만 실행됩니다. 개별 삭제 실패는
    /// 나머지 삭제를 막지 않으며, 이전 `release` 실패를 포함한 모든 실패를 반환합니다.
    pub async fn teardown<C: ControlPlane>(
        mut self,
        control_plane: &C,
        api_timeout: Duration,
    ) -> Vec<TeardownFailure> {
        let entries = std::mem::take(&mut self.entries);
        for resource in entries.iter().rev() {
            match delete_resource(control_plane, resource, api_timeout).await {
                Ok(()) => debug!(resource = %resource, "deleted resource"),
                Err(e) => {
                    warn!(resource = %resource, error = %e, "teardown failed to delete resource");
                    self.push_failure(resource.clone(), e.to_string());
                }
            }
        }
        std::mem::take(&mut self.failures)
    }

    fn push_failure(&mut self, resource: ResourceRef, reason: String) {
        metrics::counter!(
            m::TEARDOWN_FAILURES_TOTAL,
            m::LABEL_KIND => resource.kind.to_string()
        )
        .increment(1);
        self.failures.push(TeardownFailure { resource, reason });
    }
}

impl Drop for ResourceLedger {
    fn drop(&mut self) {
        if !self.entries.is_empty() {
            let leaked: Vec<String> = self.entries.iter().map(ToString::to_string).collect();
            error!(
                count = leaked.len(),
                resources = %leaked.join(", "),
                "resource ledger dropped without teardown"
            );
        }
    }
}
