//! Transient notices.
//!
//! A mutating request ends in a redirect. The outcome travels with it as two query parameters,
//! `level` and `notice`, and the next view echoes it back once.

use serde::{Deserialize, Serialize};
use url::form_urlencoded;
use utoipa::{IntoParams, ToSchema};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

impl NoticeLevel {
    /// Reads a level from a query string. Anything but `error` shows as success.
    pub fn from_query(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("error") {
            NoticeLevel::Error
        } else {
            NoticeLevel::Success
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NoticeLevel::Success => "success",
            NoticeLevel::Error => "error",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    /// Appends this notice to `path` as query parameters.
    pub fn attach_to(&self, path: &str) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("level", self.level.as_str())
            .append_pair("notice", &self.message)
            .finish();
        let separator = if path.contains('?') { '&' } else { '?' };
        format!("{path}{separator}{query}")
    }
}

/// Query parameters a view reads its notice from.
#[derive(Clone, Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NoticeParams {
    /// `success` or `error`.
    pub level: Option<String>,
    pub notice: Option<String>,
}

impl NoticeParams {
    /// The notice to show, if any. A message without a recognised level is treated as
    /// informational success.
    pub fn into_notice(self) -> Option<Notice> {
        let message = self.notice.filter(|m| !m.trim().is_empty())?;
        Some(Notice {
            level: self
                .level
                .as_deref()
                .map_or(NoticeLevel::Success, NoticeLevel::from_query),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_encodes_message() {
        let notice = Notice::error("This time slot is already taken.");
        assert_eq!(
            notice.attach_to("/book-appointment"),
            "/book-appointment?level=error&notice=This+time+slot+is+already+taken."
        );
        assert_eq!(
            Notice::success("ok").attach_to("/my-appointments?status=Pending"),
            "/my-appointments?status=Pending&level=success&notice=ok"
        );
    }

    #[test]
    fn params_without_message_yield_nothing() {
        assert_eq!(NoticeParams::default().into_notice(), None);
        let params = NoticeParams {
            level: Some("error".into()),
            notice: Some("  ".into()),
        };
        assert_eq!(params.into_notice(), None);
    }

    #[test]
    fn params_decode_from_query_string() {
        let params: NoticeParams =
            serde_json::from_value(serde_json::json!({"level": "error", "notice": "Nope"}))
                .unwrap();
        assert_eq!(params.into_notice(), Some(Notice::error("Nope")));
    }

    #[test]
    fn unknown_level_falls_back_to_success() {
        let params = NoticeParams {
            level: Some("warn".into()),
            notice: Some("Heads up".into()),
        };
        assert_eq!(params.into_notice(), Some(Notice::success("Heads up")));
    }
}
