//! Device classification from ambient environment signals.
//!
//! The speech-output fallback chain picks its strategy order from the
//! profile computed here. Classification is a pure function: signals in,
//! profile out, no errors. Pattern matching lives in this one place so
//! call sites never touch the user-agent string themselves.

use serde::{Deserialize, Serialize};

/// Runtime environment classes the fallback chain distinguishes between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceProfile {
    Desktop,
    GenericMobile,
    SamsungMobile,
    IosMobile,
}

impl DeviceProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceProfile::Desktop => "desktop",
            DeviceProfile::GenericMobile => "generic-mobile",
            DeviceProfile::SamsungMobile => "samsung-mobile",
            DeviceProfile::IosMobile => "ios-mobile",
        }
    }
}

/// Raw signals the client shell reports about its environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentSignals {
    #[serde(default)]
    pub user_agent: String,
    #[serde(default)]
    pub has_touch: bool,
    /// Manual override. Always wins over pattern matching.
    #[serde(default)]
    pub override_profile: Option<DeviceProfile>,
}

impl EnvironmentSignals {
    pub fn from_user_agent(user_agent: &str) -> Self {
        Self {
            user_agent: user_agent.to_string(),
            has_touch: false,
            override_profile: None,
        }
    }
}

// Samsung devices are the most failure-prone speech targets, so their
// patterns are checked before anything else. `SM-`/`GT-` are model-number
// prefixes that survive even when the browser hides its brand name.
const SAMSUNG_PATTERNS: &[&str] = &["samsungbrowser", "samsung", "sm-", "gt-", "galaxy"];

const IOS_PATTERNS: &[&str] = &["iphone", "ipad", "ipod"];

const MOBILE_PATTERNS: &[&str] = &[
    "android",
    "mobile",
    "webos",
    "blackberry",
    "opera mini",
    "opera mobi",
    "iemobile",
    "windows phone",
];

/// Map environment signals to a device profile.
///
/// Match order: manual override, Samsung, iOS, generic mobile, desktop.
/// Always returns a profile; an empty user agent classifies as desktop.
pub fn classify(signals: &EnvironmentSignals) -> DeviceProfile {
    if let Some(profile) = signals.override_profile {
        return profile;
    }

    let ua = signals.user_agent.to_lowercase();

    if SAMSUNG_PATTERNS.iter().any(|p| ua.contains(p)) {
        return DeviceProfile::SamsungMobile;
    }

    if IOS_PATTERNS.iter().any(|p| ua.contains(p)) {
        return DeviceProfile::IosMobile;
    }

    if MOBILE_PATTERNS.iter().any(|p| ua.contains(p)) {
        return DeviceProfile::GenericMobile;
    }

    // Touch alone is not enough (plenty of touch laptops), but touch plus
    // a UA that never mentions a desktop OS leans mobile.
    if signals.has_touch && !ua.contains("windows nt") && !ua.contains("macintosh") && !ua.is_empty()
    {
        return DeviceProfile::GenericMobile;
    }

    DeviceProfile::Desktop
}
