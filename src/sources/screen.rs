//! Screen entropy source driven entirely by `matchMedia`.
//!
//! `window.screen` lies on enough hosts that this source never reads it:
//! dimensions are reconstructed with the bracketing binary search from
//! [`crate::stabilize::search`], and discrete features are enumerated by
//! probing their closed value sets in a fixed order.

use serde::Serialize;

use crate::stabilize::search;

/// Probe tables are ordered; for features where more than one value can
/// match (`any-pointer`, `any-hover`) the more specific value comes first.
macro_rules! media_feature {
    ($name:ident, $feature:literal, [$(($variant:ident, $value:literal)),+ $(,)?]) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
        #[serde(rename_all = "kebab-case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            const FEATURE: &'static str = $feature;
            const PROBES: &'static [(Self, &'static str)] = &[
                $((Self::$variant, $value)),+
            ];
        }
    };
}

media_feature!(Orientation, "orientation", [
    (Portrait, "portrait"),
    (Landscape, "landscape"),
]);
media_feature!(DisplayMode, "display-mode", [
    (Fullscreen, "fullscreen"),
    (Standalone, "standalone"),
    (MinimalUi, "minimal-ui"),
    (Browser, "browser"),
]);
media_feature!(Pointer, "pointer", [
    (None, "none"),
    (Coarse, "coarse"),
    (Fine, "fine"),
]);
media_feature!(Hover, "hover", [(None, "none"), (Hover, "hover")]);
media_feature!(AnyPointer, "any-pointer", [
    (Fine, "fine"),
    (Coarse, "coarse"),
    (None, "none"),
]);
media_feature!(AnyHover, "any-hover", [(Hover, "hover"), (None, "none")]);
media_feature!(OverflowBlock, "overflow-block", [
    (None, "none"),
    (Scroll, "scroll"),
    (OptionalPaged, "optional-paged"),
    (Paged, "paged"),
]);
media_feature!(OverflowInline, "overflow-inline", [
    (None, "none"),
    (Scroll, "scroll"),
]);
media_feature!(Update, "update", [
    (None, "none"),
    (Slow, "slow"),
    (Fast, "fast"),
]);
media_feature!(Scripting, "scripting", [
    (None, "none"),
    (InitialOnly, "initial-only"),
    (Enabled, "enabled"),
]);

/// Device-pixel-ratio probe table, ascending; probed from the top.
const PIXEL_RATIOS: [f64; 13] = [
    0.5, 0.75, 1.0, 1.25, 1.5, 1.75, 2.0, 2.25, 2.5, 2.75, 3.0, 3.5, 4.0,
];

/// Color bit-depth probe table, ascending; probed from the top.
const COLOR_DEPTHS: [u32; 8] = [1, 4, 8, 12, 16, 24, 30, 48];

/// Result record. Dimension fields are `[low, high]` bracketing intervals
/// no wider than 10 px; discrete features are `None` when not observable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenMediaQueries {
    pub width: [u32; 2],
    pub height: [u32; 2],
    pub orientation: Option<Orientation>,
    pub display_mode: Option<DisplayMode>,
    pub pointer: Option<Pointer>,
    pub hover: Option<Hover>,
    pub any_pointer: Option<AnyPointer>,
    pub any_hover: Option<AnyHover>,
    pub overflow_block: Option<OverflowBlock>,
    pub overflow_inline: Option<OverflowInline>,
    pub update: Option<Update>,
    pub scripting: Option<Scripting>,
    pub device_pixel_ratio: f64,
    pub color_depth: u32,
}

/// Probe the host through `matchMedia` only. Never throws.
pub fn get_screen_media_queries() -> ScreenMediaQueries {
    let fallback_ratio = web_sys::window()
        .map(|w| w.device_pixel_ratio())
        .filter(|r| r.is_finite() && *r > 0.0)
        .unwrap_or(1.0);
    screen_media_queries_with(&media_matches, fallback_ratio)
}

fn media_matches(query: &str) -> bool {
    web_sys::window()
        .and_then(|w| w.match_media(query).ok().flatten())
        .map(|list| list.matches())
        .unwrap_or(false)
}

pub(crate) fn screen_media_queries_with(
    matches: &dyn Fn(&str) -> bool,
    fallback_ratio: f64,
) -> ScreenMediaQueries {
    ScreenMediaQueries {
        width: bracket_dimension(matches, "width"),
        height: bracket_dimension(matches, "height"),
        orientation: probe_feature(matches, Orientation::FEATURE, Orientation::PROBES),
        display_mode: probe_feature(matches, DisplayMode::FEATURE, DisplayMode::PROBES),
        pointer: probe_feature(matches, Pointer::FEATURE, Pointer::PROBES),
        hover: probe_feature(matches, Hover::FEATURE, Hover::PROBES),
        any_pointer: probe_feature(matches, AnyPointer::FEATURE, AnyPointer::PROBES),
        any_hover: probe_feature(matches, AnyHover::FEATURE, AnyHover::PROBES),
        overflow_block: probe_feature(matches, OverflowBlock::FEATURE, OverflowBlock::PROBES),
        overflow_inline: probe_feature(matches, OverflowInline::FEATURE, OverflowInline::PROBES),
        update: probe_feature(matches, Update::FEATURE, Update::PROBES),
        scripting: probe_feature(matches, Scripting::FEATURE, Scripting::PROBES),
        device_pixel_ratio: probe_pixel_ratio(matches, fallback_ratio),
        color_depth: probe_color_depth(matches),
    }
}

fn bracket_dimension(matches: &dyn Fn(&str) -> bool, dimension: &str) -> [u32; 2] {
    let low = search::largest_matching(|m| matches(&format!("(min-{dimension}: {m}px)")));
    let high = search::smallest_matching(|m| matches(&format!("(max-{dimension}: {m}px)")));
    // A host answering inconsistently can cross the bounds; keep the
    // interval ordered.
    [low.min(high), high.max(low)]
}

fn probe_feature<T: Copy>(
    matches: &dyn Fn(&str) -> bool,
    feature: &str,
    probes: &[(T, &str)],
) -> Option<T> {
    probes
        .iter()
        .find(|(_, value)| matches(&format!("({feature}: {value})")))
        .map(|(variant, _)| *variant)
}

fn probe_pixel_ratio(matches: &dyn Fn(&str) -> bool, fallback: f64) -> f64 {
    PIXEL_RATIOS
        .iter()
        .rev()
        .find(|ratio| matches(&format!("(min-resolution: {}dppx)", format_ratio(**ratio))))
        .copied()
        .unwrap_or(fallback)
}

fn probe_color_depth(matches: &dyn Fn(&str) -> bool) -> u32 {
    COLOR_DEPTHS
        .iter()
        .rev()
        .find(|depth| matches(&format!("(min-color: {depth})")))
        .copied()
        .unwrap_or(0)
}

fn format_ratio(ratio: f64) -> String {
    if ratio.fract() == 0.0 {
        format!("{}", ratio as u32)
    } else {
        format!("{ratio}")
    }
}
