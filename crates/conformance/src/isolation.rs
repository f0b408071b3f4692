//! 격리 모드 제어 -- 도메인 annotation으로 기본 허용/거부 전환
//!
//! 격리 모드는 도메인의 annotation 하나로 기록됩니다.
//! 거부 모드는 `{"ingress":{"isolation":"DefaultDeny"}}` 값을 갖고,
//! 허용 모드는 annotation 맵 자체가 비어있습니다.
//!
//! 모드 변경은 항상 annotation 맵 전체를 교체하는 무조건 쓰기입니다.
//! 도메인에 있던 다른 annotation은 지워집니다.

use std::sync::Arc;
use std::time::Duration;

use fencecheck_core::types::{IsolationMode, Labels};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cluster::ControlPlane;
use crate::error::ConformanceError;
use crate::wait::call_with_timeout;

/// 격리 모드를 기록하는 기본 annotation 키
pub const DEFAULT_ISOLATION_ANNOTATION: &str = "net.beta.kubernetes.io/network-policy";

/// 기본 거부를 나타내는 isolation 값
const DEFAULT_DENY: &str = "DefaultDeny";

#[derive(Debug, Serialize, Deserialize)]
struct IsolationAnnotation {
    ingress: IngressIsolation,
}

#[derive(Debug, Serialize, Deserialize)]
struct IngressIsolation {
    isolation: String,
}

/// 격리 모드에 해당하는 annotation 맵을 생성합니다.
pub fn annotations_for(mode: IsolationMode, annotation_key: &str) -> Labels {
    let mut annotations = Labels::new();
    if mode == IsolationMode::Restrictive {
        let value = serde_json::json!({ "ingress": { "isolation": DEFAULT_DENY } });
        annotations.insert(annotation_key.to_owned(), value.to_string());
    }
    annotations
}

/// annotation 맵에서 격리 모드를 읽습니다.
///
/// annotation이 없거나 해석할 수 없으면 `Permissive`입니다.
pub fn mode_from_annotations(annotations: &Labels, annotation_key: &str) -> IsolationMode {
    let Some(raw) = annotations.get(annotation_key) else {
        return IsolationMode::Permissive;
    };
    match serde_json::from_str::<IsolationAnnotation>(raw) {
        Ok(parsed) if parsed.ingress.isolation == DEFAULT_DENY => IsolationMode::Restrictive,
        Ok(_) => IsolationMode::Permissive,
        Err(e) => {
            warn!(annotation = annotation_key, error = %e, "unparseable isolation annotation");
            IsolationMode::Permissive
        }
    }
}

/// 격리 모드 컨트롤러
pub struct IsolationController<C: ControlPlane> {
    /// 컨트롤 플레인
    control_plane: Arc<C>,
    /// 격리 모드 annotation 키
    annotation_key: String,
    /// API 호출 제한 시간
    api_timeout: Duration,
}

impl<C: ControlPlane> IsolationController<C> {
    /// 새 격리 모드 컨트롤러를 생성합니다.
    pub fn new(
        control_plane: Arc<C>,
        annotation_key: impl Into<String>,
        api_timeout: Duration,
    ) -> Self {
        Self {
            control_plane,
            annotation_key: annotation_key.into(),
            api_timeout,
        }
    }

    /// 도메인의 격리 모드를 설정합니다.
    ///
    /// 현재 값과 무관하게 annotation 맵 전체를 교체합니다.
    pub async fn set_mode(&self, domain: &str, mode: IsolationMode) -> Result<(), ConformanceError> {
        let annotations = annotations_for(mode, &self.annotation_key);
        call_with_timeout(
            &format!("set isolation mode on {domain}"),
            self.api_timeout,
            self.control_plane
                .replace_domain_annotations(domain, &annotations),
        )
        .await?;
        info!(domain, mode = %mode, "isolation mode set");
        Ok(())
    }

    /// 도메인의 현재 격리 모드를 읽습니다.
    pub async fn current_mode(&self, domain: &str) -> Result<IsolationMode, ConformanceError> {
        let info = call_with_timeout(
            &format!("get domain {domain}"),
            self.api_timeout,
            self.control_plane.get_domain(domain),
        )
        .await?;
        Ok(mode_from_annotations(&info.annotations, &self.annotation_key))
    }
}
