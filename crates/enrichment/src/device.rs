//! User agent classification.

use engine_core::DeviceInfo;
use woothee::parser::Parser;

/// Parses user agents into browser, OS and device class.
///
/// Uses woothee (~7us/parse). Never fails: an empty or unrecognised agent
/// yields the fixed `Unknown` record.
pub struct DeviceParser {
    parser: Parser,
}

impl DeviceParser {
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
        }
    }

    pub fn parse(&self, user_agent: Option<&str>) -> DeviceInfo {
        let Some(user_agent) = user_agent.map(str::trim).filter(|ua| !ua.is_empty()) else {
            return DeviceInfo::unknown();
        };
        let Some(result) = self.parser.parse(user_agent) else {
            return DeviceInfo::unknown();
        };

        // woothee categories: pc, smartphone, mobilephone, crawler, appliance, misc
        let device = match result.category {
            "pc" => "desktop",
            "smartphone" | "mobilephone" => "mobile",
            "crawler" => "bot",
            "appliance" => "other",
            _ => DeviceInfo::UNKNOWN,
        };

        DeviceInfo {
            browser: known_or_unknown(result.name),
            os: known_or_unknown(result.os),
            device: device.to_string(),
        }
    }
}

impl Default for DeviceParser {
    fn default() -> Self {
        Self::new()
    }
}

fn known_or_unknown(value: &str) -> String {
    if value.is_empty() || value == "UNKNOWN" {
        DeviceInfo::UNKNOWN.to_string()
    } else {
        value.to_string()
    }
}
