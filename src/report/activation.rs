//! Activation-method recovery strategies.
//!
//! Instrument-info reports list activation methods under an
//! `Activation methods` heading, one `MS-Level 2 & <method>: <count>` line per
//! method, with no label on the method lines themselves. Recovering the method
//! is therefore a heuristic and lives behind [`ActivationStrategy`].

/// Prefix stripped from a multi-level activation line
pub const MULTI_LEVEL_PREFIX: &str = "MS-Level 2 & ";

/// Stateful per-report strategy for recovering the activation method
pub trait ActivationStrategy {
    /// Called for a line carrying the `activation methods` heading
    fn on_heading(&mut self, line: &str);

    /// Called for every line no field marker claimed
    fn on_unclassified(&mut self, line: &str);

    /// Recovered activation method, if any
    fn finish(&mut self) -> Option<String>;
}

#[derive(Debug, Clone, Default, PartialEq)]
enum State {
    #[default]
    Idle,
    Armed,
    Captured(String),
}

/// Takes the first unclassified line after the heading as the method name.
///
/// The name is the text before the first colon with [`MULTI_LEVEL_PREFIX`]
/// removed. A later heading re-arms the capture and discards the previous
/// name. Blank lines never capture.
#[derive(Debug, Clone, Default)]
pub struct FollowingLine {
    state: State,
}

impl ActivationStrategy for FollowingLine {
    fn on_heading(&mut self, _line: &str) {
        self.state = State::Armed;
    }

    fn on_unclassified(&mut self, line: &str) {
        if self.state != State::Armed || line.is_empty() {
            return;
        }
        self.state = State::Captured(method_name(line).to_string());
    }

    fn finish(&mut self) -> Option<String> {
        match std::mem::take(&mut self.state) {
            State::Captured(name) if !name.is_empty() => Some(name),
            _ => None,
        }
    }
}

/// Never recovers an activation method
#[derive(Debug, Clone, Copy, Default)]
pub struct Disabled;

impl ActivationStrategy for Disabled {
    fn on_heading(&mut self, _line: &str) {}

    fn on_unclassified(&mut self, _line: &str) {}

    fn finish(&mut self) -> Option<String> {
        None
    }
}

/// Method name of an `MS-Level 2 & <method>: <count>` line
pub fn method_name(line: &str) -> &str {
    let before_colon = line.split(':').next().unwrap_or(line);
    before_colon
        .rsplit(MULTI_LEVEL_PREFIX)
        .next()
        .unwrap_or(before_colon)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_name_strips_prefix_and_count() {
        assert_eq!(
            method_name("MS-Level 2 & HCID (High-energy collision-induced dissociation): 5311"),
            "HCID (High-energy collision-induced dissociation)"
        );
        assert_eq!(method_name("CID: 12"), "CID");
    }

    #[test]
    fn test_following_line_requires_heading() {
        let mut strategy = FollowingLine::default();
        strategy.on_unclassified("MS-Level 2 & CID: 3");
        assert_eq!(strategy.finish(), None);
    }

    #[test]
    fn test_following_line_captures_only_first_line() {
        let mut strategy = FollowingLine::default();
        strategy.on_heading("Activation methods");
        strategy.on_unclassified("");
        strategy.on_unclassified("MS-Level 2 & ETD (Electron transfer dissociation): 7");
        strategy.on_unclassified("MS-Level 2 & CID: 3");
        assert_eq!(
            strategy.finish(),
            Some("ETD (Electron transfer dissociation)".to_string())
        );
    }

    #[test]
    fn test_second_heading_rearms() {
        let mut strategy = FollowingLine::default();
        strategy.on_heading("Activation methods");
        strategy.on_unclassified("MS-Level 2 & CID: 3");
        strategy.on_heading("Activation methods");
        assert_eq!(strategy.finish(), None);
    }
}
