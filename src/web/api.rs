use std::any::Any;
use std::net::IpAddr;

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, info};

use crate::activity::{self, AttackSummary, LogActivityRecord, DEFAULT_LIMIT};
use crate::colors::{color_for, JailColor};
use crate::fail2ban::{BannedIpRecord, FailedIpRecord, JailStatus};
use crate::geoip::GeoInfo;
use crate::histogram::Histogram;

use super::AppState;

/// Banned addresses enriched with geolocation on the detail view.
const DETAIL_BANNED_LIMIT: usize = 30;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(&'static str),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("Authentication required")]
    Unauthorized,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(err) = &self {
            error!(error = %err, "request failed");
        }
        let body = json!({ "success": false, "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

/// Turns a handler panic into the same 500 body as any other internal error.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else {
        "internal error".to_string()
    };
    ApiError::Internal(anyhow::anyhow!(message)).into_response()
}

#[derive(Serialize)]
pub struct JailSummary {
    #[serde(flatten)]
    pub status: JailStatus,
    pub color: JailColor,
}

#[derive(Serialize)]
pub struct BannedIpView {
    #[serde(flatten)]
    pub record: BannedIpRecord,
    pub country: GeoInfo,
}

#[derive(Serialize)]
pub struct JailDetail {
    #[serde(flatten)]
    pub status: JailStatus,
    pub banned_ips: Vec<BannedIpView>,
    pub failed_ips: Vec<FailedIpRecord>,
    pub color: JailColor,
}

#[derive(Serialize)]
pub struct JailsResp {
    pub success: bool,
    pub jails: Vec<JailSummary>,
}

#[derive(Serialize)]
pub struct JailResp {
    pub success: bool,
    pub jail: JailDetail,
}

#[derive(Serialize)]
pub struct HistogramResp {
    pub success: bool,
    pub histogram: Histogram,
}

#[derive(Serialize)]
pub struct ActionResp {
    pub success: bool,
}

#[derive(Serialize)]
pub struct LogsResp {
    pub success: bool,
    pub logs: Vec<LogActivityRecord>,
}

#[derive(Serialize)]
pub struct SummaryResp {
    pub success: bool,
    pub summary: AttackSummary,
}

#[derive(Deserialize)]
pub struct LogsQuery {
    pub limit: Option<usize>,
}

pub async fn jails(State(state): State<AppState>) -> Result<Json<JailsResp>, ApiError> {
    let mut jails = Vec::new();
    for name in state.fail2ban.list_jails().await {
        if let Some(status) = state.fail2ban.get_status(&name).await {
            jails.push(JailSummary {
                color: color_for(&name),
                status,
            });
        }
    }
    Ok(Json(JailsResp {
        success: true,
        jails,
    }))
}

pub async fn jail_detail(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<JailResp>, ApiError> {
    let status = state
        .fail2ban
        .get_status(&name)
        .await
        .ok_or(ApiError::NotFound("Jail not found"))?;

    let mut banned_ips = Vec::new();
    for record in state
        .fail2ban
        .banned_ips(&name)
        .await
        .into_iter()
        .take(DETAIL_BANNED_LIMIT)
    {
        let country = state.geoip.lookup(&record.ip).await;
        banned_ips.push(BannedIpView { record, country });
    }

    let failed_ips = state.fail2ban.failed_ips(&name).await;

    Ok(Json(JailResp {
        success: true,
        jail: JailDetail {
            status,
            banned_ips,
            failed_ips,
            color: color_for(&name),
        },
    }))
}

pub async fn histogram(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<HistogramResp>, ApiError> {
    let histogram = state.fail2ban.reject_histogram(&name).await;
    Ok(Json(HistogramResp {
        success: true,
        histogram,
    }))
}

/// The `ip` member of a ban/unban body, if present and a valid address.
fn requested_ip(body: &[u8]) -> Result<String, ApiError> {
    serde_json::from_slice::<Value>(body)
        .ok()
        .as_ref()
        .and_then(|v| v.get("ip"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|ip| ip.parse::<IpAddr>().is_ok())
        .map(str::to_string)
        .ok_or(ApiError::BadRequest("IP address required"))
}

pub async fn ban(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<ActionResp>, ApiError> {
    let ip = requested_ip(&body)?;
    let success = state.fail2ban.ban(&name, &ip).await;
    info!(jail = %name, %ip, success, "manual ban");
    Ok(Json(ActionResp { success }))
}

pub async fn unban(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<ActionResp>, ApiError> {
    let ip = requested_ip(&body)?;
    let success = state.fail2ban.unban(&name, &ip).await;
    info!(jail = %name, %ip, success, "manual unban");
    Ok(Json(ActionResp { success }))
}

async fn jail_activity(
    state: &AppState,
    name: &str,
    limit: usize,
) -> Result<Vec<LogActivityRecord>, ApiError> {
    let (category, lines) = state.logs.recent_lines(name).await;
    // scanning ten thousand lines against several regexes is CPU bound
    tokio::task::spawn_blocking(move || {
        activity::extract(lines.iter().map(String::as_str), category.patterns(), limit)
    })
    .await
    .map_err(|err| ApiError::Internal(err.into()))
}

pub async fn logs(
    State(state): State<AppState>,
    Path(name): Path<String>,
    query: Result<Query<LogsQuery>, QueryRejection>,
) -> Result<Json<LogsResp>, ApiError> {
    let Query(query) = query.map_err(|_| ApiError::BadRequest("Invalid limit"))?;
    let logs = jail_activity(&state, &name, query.limit.unwrap_or(DEFAULT_LIMIT)).await?;
    Ok(Json(LogsResp {
        success: true,
        logs,
    }))
}

pub async fn summary(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<SummaryResp>, ApiError> {
    let records = jail_activity(&state, &name, DEFAULT_LIMIT).await?;
    Ok(Json(SummaryResp {
        success: true,
        summary: AttackSummary::from_records(&records),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ip_must_be_present_and_valid() {
        assert_eq!(requested_ip(br#"{"ip":"1.2.3.4"}"#).unwrap(), "1.2.3.4");
        assert_eq!(requested_ip(br#"{"ip":" 1.2.3.4 "}"#).unwrap(), "1.2.3.4");
        for body in [
            &b""[..],
            b"not json",
            br#"{}"#,
            br#"{"ip":""}"#,
            br#"{"ip":42}"#,
            br#"{"ip":"1.2.3.4; rm -rf /"}"#,
            br#"["1.2.3.4"]"#,
        ] {
            assert!(matches!(requested_ip(body), Err(ApiError::BadRequest(_))));
        }
    }

    #[test]
    fn internal_errors_render_as_500_json() {
        let resp = ApiError::Internal(anyhow::anyhow!("boom")).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let resp = panic_response(Box::new("kaboom"));
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn detail_flattens_status_fields() {
        let detail = JailDetail {
            status: JailStatus {
                name: "sshd".into(),
                currently_banned: 2,
                ..JailStatus::default()
            },
            banned_ips: vec![BannedIpView {
                record: BannedIpRecord {
                    ip: "10.0.0.1".into(),
                    reject_count: 7,
                },
                country: GeoInfo::private(),
            }],
            failed_ips: Vec::new(),
            color: color_for("sshd"),
        };
        let value = serde_json::to_value(&detail).unwrap();
        assert_eq!(value["name"], "sshd");
        assert_eq!(value["currently_banned"], 2);
        assert_eq!(value["banned_ips"][0]["ip"], "10.0.0.1");
        assert_eq!(value["banned_ips"][0]["reject_count"], 7);
        assert_eq!(value["banned_ips"][0]["country"]["country"], "Private");
        assert_eq!(value["color"]["bg"], "bg-blue-500");
    }
}
