//! Environment oracle: engine family, major version and mobile class.
//!
//! Every top-level source call derives one [`EnvironmentClass`] from the
//! host's user agent plus a touch-point probe, then treats it as an
//! immutable input. Nothing here is cached across calls.

use serde::Serialize;

/// Browser classification consumed by the sources.
///
/// WebKit build numbers are frozen in the user agent (`AppleWebKit/605.1.15`
/// on every modern Safari), so the WebKit 616 threshold is derived from the
/// Safari major version instead: Safari 17 ships WebKit 616.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentClass {
    pub is_webkit: bool,
    pub is_safari_webkit: bool,
    pub is_mobile: bool,
    pub is_samsung_internet: bool,
    pub major_version: Option<u32>,
    pub is_webkit_616_or_newer: bool,
}

/// User-agent tokens that identify a non-Safari browser riding on WebKit.
const NON_SAFARI_TOKENS: [&str; 7] = [
    "Chrome/",
    "CriOS/",
    "FxiOS/",
    "EdgiOS/",
    "Edg/",
    "OPR/",
    "SamsungBrowser/",
];

/// Version tokens in resolution order. The first one present wins; Safari's
/// `Version/` token is last because Chrome-family agents also carry
/// `Safari/` but never `Version/`.
const VERSION_TOKENS: [&str; 7] = [
    "SamsungBrowser/",
    "CriOS/",
    "FxiOS/",
    "EdgiOS/",
    "Chrome/",
    "Firefox/",
    "Version/",
];

impl EnvironmentClass {
    /// Classify the current host.
    pub fn detect() -> Self {
        let navigator = web_sys::window().map(|w| w.navigator());
        let user_agent = navigator
            .as_ref()
            .and_then(|n| n.user_agent().ok())
            .unwrap_or_default();
        let touch_points = navigator
            .as_ref()
            .map(|n| n.max_touch_points().max(0) as u32)
            .unwrap_or(0);
        Self::from_user_agent(&user_agent, touch_points)
    }

    /// Classify from a user-agent string and the `maxTouchPoints` probe.
    ///
    /// The touch-point probe is required because iPadOS requests desktop
    /// pages with a Macintosh user agent; touch support is the only
    /// remaining mobile marker there.
    pub fn from_user_agent(user_agent: &str, max_touch_points: u32) -> Self {
        let is_webkit = user_agent.contains("AppleWebKit/");
        let is_samsung_internet = user_agent.contains("SamsungBrowser/");

        let is_safari_webkit = is_webkit
            && user_agent.contains("Safari/")
            && !NON_SAFARI_TOKENS.iter().any(|t| user_agent.contains(t));

        let is_mobile = user_agent.contains("Mobile")
            || user_agent.contains("iPhone")
            || user_agent.contains("iPad")
            || (user_agent.contains("Macintosh") && max_touch_points > 1);

        let major_version = VERSION_TOKENS
            .iter()
            .find_map(|token| token_major_version(user_agent, token));

        let is_webkit_616_or_newer =
            is_safari_webkit && major_version.is_some_and(|v| v >= 17);

        Self {
            is_webkit,
            is_safari_webkit,
            is_mobile,
            is_samsung_internet,
            major_version,
            is_webkit_616_or_newer,
        }
    }

    /// Hosts where WebKit applies neighbourhood-clamped canvas noise on
    /// readback; the 3×3 scaling exploit applies.
    pub(crate) fn clamped_canvas_noise(&self) -> bool {
        self.is_safari_webkit && self.is_webkit_616_or_newer
    }

    /// Hosts known to suspend an offline audio graph indefinitely outside a
    /// user gesture.
    pub(crate) fn suspends_audio_graph(&self) -> bool {
        self.is_mobile && self.is_webkit && self.major_version.is_some_and(|v| v < 12)
    }
}

fn token_major_version(user_agent: &str, token: &str) -> Option<u32> {
    let start = user_agent.find(token)? + token.len();
    let digits: String = user_agent[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAFARI_17_MAC: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
        AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15";
    const SAFARI_11_IOS: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 11_2 like Mac OS X) \
        AppleWebKit/604.4.7 (KHTML, like Gecko) Version/11.0 Mobile/15C114 Safari/604.1";
    const CHROME_DESKTOP: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
        AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";
    const SAMSUNG_26: &str = "Mozilla/5.0 (Linux; Android 14; SM-S921B) \
        AppleWebKit/537.36 (KHTML, like Gecko) SamsungBrowser/26.0 Chrome/122.0.0.0 \
        Mobile Safari/537.36";
    const FIREFOX_DESKTOP: &str =
        "Mozilla/5.0 (X11; Linux x86_64; rv:126.0) Gecko/20100101 Firefox/126.0";

    #[test]
    fn safari_17_mac() {
        let env = EnvironmentClass::from_user_agent(SAFARI_17_MAC, 0);
        assert!(env.is_webkit);
        assert!(env.is_safari_webkit);
        assert!(!env.is_mobile);
        assert_eq!(env.major_version, Some(17));
        assert!(env.is_webkit_616_or_newer);
        assert!(env.clamped_canvas_noise());
    }

    #[test]
    fn ios_safari_11_suspends_audio() {
        let env = EnvironmentClass::from_user_agent(SAFARI_11_IOS, 5);
        assert!(env.is_webkit);
        assert!(env.is_mobile);
        assert_eq!(env.major_version, Some(11));
        assert!(env.suspends_audio_graph());
        assert!(!env.is_webkit_616_or_newer);
    }

    #[test]
    fn chrome_is_not_safari() {
        let env = EnvironmentClass::from_user_agent(CHROME_DESKTOP, 0);
        assert!(env.is_webkit);
        assert!(!env.is_safari_webkit);
        assert_eq!(env.major_version, Some(126));
        assert!(!env.clamped_canvas_noise());
        assert!(!env.suspends_audio_graph());
    }

    #[test]
    fn samsung_internet_version_wins_over_chrome_token() {
        let env = EnvironmentClass::from_user_agent(SAMSUNG_26, 5);
        assert!(env.is_samsung_internet);
        assert!(env.is_mobile);
        assert_eq!(env.major_version, Some(26));
        assert!(!env.is_safari_webkit);
    }

    #[test]
    fn ipad_desktop_agent_detected_via_touch_points() {
        let env = EnvironmentClass::from_user_agent(SAFARI_17_MAC, 5);
        assert!(env.is_mobile);
    }

    #[test]
    fn non_webkit_browser() {
        let env = EnvironmentClass::from_user_agent(FIREFOX_DESKTOP, 0);
        assert!(!env.is_webkit);
        assert!(!env.is_safari_webkit);
        assert_eq!(env.major_version, Some(126));
    }

    #[test]
    fn empty_user_agent() {
        let env = EnvironmentClass::from_user_agent("", 0);
        assert!(!env.is_webkit);
        assert_eq!(env.major_version, None);
        assert!(!env.suspends_audio_graph());
    }
}
