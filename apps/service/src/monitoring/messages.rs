//! Diagnostic strings surfaced through `CheckResult::error_message`.

use serde::{Deserialize, Serialize};

/// Language used for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Zh,
    En,
}

impl Locale {
    pub fn timeout(self, seconds: u64) -> String {
        match self {
            Locale::Zh => format!("超时 ({seconds}s)"),
            Locale::En => format!("timeout ({seconds}s)"),
        }
    }

    pub fn request_failed(self, detail: &str) -> String {
        match self {
            Locale::Zh => format!("请求失败: {detail}"),
            Locale::En => format!("request failed: {detail}"),
        }
    }

    pub fn status_not_expected(self, code: u16) -> String {
        match self {
            Locale::Zh => format!("状态码 {code} 不在预期列表中"),
            Locale::En => format!("status code {code} not in expected list"),
        }
    }

    pub fn forbidden_keyword(self) -> String {
        match self {
            Locale::Zh => "检测到禁止关键词".to_string(),
            Locale::En => "forbidden keyword detected".to_string(),
        }
    }

    pub fn keyword_missing(self) -> String {
        match self {
            Locale::Zh => "未找到关键词".to_string(),
            Locale::En => "keyword not found".to_string(),
        }
    }

    pub fn connection_timeout(self, seconds: u64) -> String {
        match self {
            Locale::Zh => format!("连接超时 ({seconds}s)"),
            Locale::En => format!("connection timeout ({seconds}s)"),
        }
    }

    pub fn connection_failed(self) -> String {
        match self {
            Locale::Zh => "连接失败".to_string(),
            Locale::En => "connection failed".to_string(),
        }
    }

    pub fn offline_server(self, region: &str, name: &str, minutes: i64) -> String {
        match self {
            Locale::Zh => format!("{region}{name}({minutes}分钟)"),
            Locale::En => format!("{region}{name}({minutes} min)"),
        }
    }

    pub fn servers_offline(self, descriptors: &[String]) -> String {
        match self {
            Locale::Zh => format!("服务器离线: {}", descriptors.join(", ")),
            Locale::En => format!("servers offline: {}", descriptors.join(", ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zh_is_the_default_catalog() {
        let locale = Locale::default();
        assert_eq!(locale.connection_failed(), "连接失败");
        assert_eq!(locale.connection_timeout(5), "连接超时 (5s)");
        assert_eq!(locale.offline_server("", "n1", 5), "n1(5分钟)");
    }

    #[test]
    fn en_catalog_matches_product_wording() {
        assert_eq!(Locale::En.status_not_expected(500), "status code 500 not in expected list");
        assert_eq!(Locale::En.connection_failed(), "connection failed");
        assert_eq!(Locale::En.timeout(30), "timeout (30s)");
    }
}
