// src/services/arrivals.rs

//! Route status fetcher for the Seoul bus arrival API.
//!
//! `getArrInfoByRouteAll` returns one item per stop on the route. A stop is
//! currently detoured when its `deTourAt` flag is `"11"`; any other value
//! (including a missing flag) is treated as normal.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::{BusConfig, Route, RouteSnapshot, StopRecord};

/// `deTourAt` value marking a detoured stop.
pub const DETOUR_FLAG: &str = "11";

/// Header codes: `0` success, `4` no result for the query.
const HEADER_OK: &str = "0";
const HEADER_NO_RESULT: &str = "4";

/// Source of the current detoured-stop list for a route.
#[async_trait]
pub trait RouteStatusSource: Send + Sync {
    /// Detoured stops in upstream order.
    async fn detoured_stops(&self, route: &Route) -> Result<Vec<StopRecord>>;
}

/// Fetch a route and wrap the result in a snapshot stamped now.
pub async fn fetch_snapshot(source: &dyn RouteStatusSource, route: &Route) -> Result<RouteSnapshot> {
    let stops = source.detoured_stops(route).await?;
    Ok(RouteSnapshot::new(route.clone(), stops, Utc::now()))
}

/// HTTP client for `getArrInfoByRouteAll`.
pub struct BusArrivalClient {
    client: Client,
    api_url: String,
    service_key: String,
}

impl BusArrivalClient {
    pub fn new(client: Client, config: &BusConfig) -> Self {
        Self {
            client,
            api_url: config.api_url.clone(),
            service_key: config.service_key.clone(),
        }
    }
}

#[async_trait]
impl RouteStatusSource for BusArrivalClient {
    async fn detoured_stops(&self, route: &Route) -> Result<Vec<StopRecord>> {
        let body = self
            .client
            .get(&self.api_url)
            .query(&[
                ("serviceKey", self.service_key.as_str()),
                ("busRouteId", route.route_id.as_str()),
                ("resultType", "json"),
            ])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_detoured_stops(&body, &route.display_name)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArrivalResponse {
    msg_header: MsgHeader,
    #[serde(default)]
    msg_body: Option<MsgBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MsgHeader {
    header_cd: String,
    #[serde(default)]
    header_msg: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MsgBody {
    #[serde(default)]
    item_list: Option<Vec<ArrivalItem>>,
}

/// One stop on the route. Only the fields used here are read.
#[derive(Debug, Deserialize)]
struct ArrivalItem {
    #[serde(rename = "stNm", default)]
    stop_name: Option<String>,
    #[serde(rename = "arsId", default)]
    stop_id: Option<String>,
    #[serde(rename = "deTourAt", default)]
    detour_flag: Option<String>,
}

/// Parse an arrival response body into the detoured stops, in order.
///
/// `context` names the route in error messages.
pub fn parse_detoured_stops(body: &str, context: &str) -> Result<Vec<StopRecord>> {
    let response: ArrivalResponse = serde_json::from_str(body)
        .map_err(|e| AppError::parse(context, format!("unreadable response body: {e}")))?;

    match response.msg_header.header_cd.trim() {
        HEADER_OK => {}
        HEADER_NO_RESULT => return Ok(Vec::new()),
        code => {
            return Err(AppError::upstream(
                context,
                format!(
                    "headerCd {}: {}",
                    code,
                    response.msg_header.header_msg.unwrap_or_default()
                ),
            ));
        }
    }

    let items = response
        .msg_body
        .and_then(|body| body.item_list)
        .unwrap_or_default();

    let mut stops = Vec::new();
    for (index, item) in items.into_iter().enumerate() {
        if item.detour_flag.as_deref().map(str::trim) != Some(DETOUR_FLAG) {
            continue;
        }
        let stop_name = required(item.stop_name, "stNm", index, context)?;
        let stop_id = required(item.stop_id, "arsId", index, context)?;
        stops.push(StopRecord { stop_name, stop_id });
    }
    Ok(stops)
}

fn required(value: Option<String>, field: &str, index: usize, context: &str) -> Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            AppError::parse(
                context,
                format!("detoured stop #{} is missing {}", index, field),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(items: &str) -> String {
        format!(
            r#"{{
                "comMsgHeader": {{"errMsg": null}},
                "msgHeader": {{"headerMsg": "정상적으로 처리되었습니다.", "headerCd": "0", "itemCount": 0}},
                "msgBody": {{"itemList": [{items}]}}
            }}"#
        )
    }

    #[test]
    fn test_filters_detoured_stops_in_order() {
        let json = body(
            r#"
            {"stNm": "연세대앞", "arsId": "13001", "deTourAt": "00", "busRouteId": "100100447"},
            {"stNm": "신촌오거리", "arsId": "13002", "deTourAt": "11"},
            {"stNm": "이대후문", "arsId": "13003", "deTourAt": "00"},
            {"stNm": "서대문구청", "arsId": "13004", "deTourAt": "11"}
            "#,
        );

        let stops = parse_detoured_stops(&json, "7016").unwrap();
        assert_eq!(
            stops,
            vec![
                StopRecord::new("신촌오거리", "13002"),
                StopRecord::new("서대문구청", "13004"),
            ]
        );
    }

    #[test]
    fn test_missing_or_unknown_flag_is_normal() {
        let json = body(
            r#"
            {"stNm": "A", "arsId": "1"},
            {"stNm": "B", "arsId": "2", "deTourAt": "99"},
            {"stNm": "C", "arsId": "3", "deTourAt": null}
            "#,
        );
        assert!(parse_detoured_stops(&json, "7016").unwrap().is_empty());
    }

    #[test]
    fn test_missing_field_on_detoured_stop_is_error() {
        let json = body(r#"{"stNm": "A", "deTourAt": "11"}"#);
        let err = parse_detoured_stops(&json, "7016").unwrap_err();
        assert!(matches!(err, AppError::Parse { .. }));
        assert!(err.to_string().contains("arsId"));
    }

    #[test]
    fn test_missing_field_on_normal_stop_is_ignored() {
        let json = body(r#"{"deTourAt": "00"}, {"stNm": "B", "arsId": "2", "deTourAt": "11"}"#);
        let stops = parse_detoured_stops(&json, "7016").unwrap();
        assert_eq!(stops, vec![StopRecord::new("B", "2")]);
    }

    #[test]
    fn test_null_item_list_is_empty() {
        let json = r#"{"msgHeader": {"headerCd": "0"}, "msgBody": {"itemList": null}}"#;
        assert!(parse_detoured_stops(json, "7016").unwrap().is_empty());
    }

    #[test]
    fn test_no_result_header_is_empty() {
        let json = r#"{"msgHeader": {"headerCd": "4", "headerMsg": "결과가 없습니다."}}"#;
        assert!(parse_detoured_stops(json, "7016").unwrap().is_empty());
    }

    #[test]
    fn test_error_header_is_upstream_error() {
        let json = r#"{"msgHeader": {"headerCd": "7", "headerMsg": "인증실패"}, "msgBody": null}"#;
        let err = parse_detoured_stops(json, "7016").unwrap_err();
        assert!(matches!(err, AppError::Upstream { .. }));
    }

    #[test]
    fn test_garbage_body_is_parse_error() {
        let err = parse_detoured_stops("<html>503</html>", "7016").unwrap_err();
        assert!(matches!(err, AppError::Parse { .. }));
    }
}
