use std::fmt;

use bytestring::ByteString;

/// One level of a compiled topic filter.
///
/// `+` and `#` are recognized as wildcards only in the positions the MQTT
/// grammar allows (a whole level, and for `#` the final level). Anywhere
/// else the character is kept as part of a literal level, so compiling
/// never fails and malformed filters simply match themselves verbatim.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum FilterLevel {
    Literal(String),
    /// Single-level wildcard `+`, matches exactly one non-empty level.
    Single,
    /// Multi-level wildcard `#`, matches the remaining zero-or-more levels.
    Multi,
}

impl FilterLevel {
    #[inline]
    pub fn is_wildcard(&self) -> bool {
        !matches!(self, FilterLevel::Literal(_))
    }
}

/// A compiled topic filter: the raw filter string plus its level matcher.
///
/// Matching is anchored to the whole topic and respects `/` level
/// boundaries: `+` never crosses a separator, and `#` also covers the
/// parent level, so `sport/#` matches `sport` as well as `sport/tennis`.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct TopicFilter {
    raw: ByteString,
    levels: Vec<FilterLevel>,
}

impl TopicFilter {
    /// Compiles a filter string. Total: there is no invalid input.
    pub fn compile<S: Into<ByteString>>(filter: S) -> Self {
        let raw = filter.into();
        let count = raw.split('/').count();
        let levels = raw
            .split('/')
            .enumerate()
            .map(|(pos, seg)| match seg {
                "+" => FilterLevel::Single,
                "#" if pos + 1 == count => FilterLevel::Multi,
                _ => FilterLevel::Literal(String::from(seg)),
            })
            .collect();
        TopicFilter { raw, levels }
    }

    /// Whole-topic match against this filter.
    pub fn matches<S: AsRef<str> + ?Sized>(&self, topic: &S) -> bool {
        let mut segs = topic.as_ref().split('/');
        for level in &self.levels {
            match level {
                FilterLevel::Multi => return true,
                FilterLevel::Single => match segs.next() {
                    Some(seg) if !seg.is_empty() => {}
                    _ => return false,
                },
                FilterLevel::Literal(lhs) => match segs.next() {
                    Some(seg) if lhs == seg => {}
                    _ => return false,
                },
            }
        }
        segs.next().is_none()
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        self.raw.as_ref()
    }

    #[inline]
    pub fn raw(&self) -> &ByteString {
        &self.raw
    }

    #[inline]
    pub fn levels(&self) -> &[FilterLevel] {
        &self.levels
    }
}

impl fmt::Display for TopicFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.raw.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal() {
        let t = TopicFilter::compile("sport/tennis/player1");
        assert!(t.matches("sport/tennis/player1"));
        assert!(!t.matches("sport/tennis/player2"));
        assert!(!t.matches("sport/tennis"));
        assert!(!t.matches("sport/tennis/player1/ranking"));

        // no wildcards: match is string equality, including blank levels
        assert!(TopicFilter::compile("/finance").matches("/finance"));
        assert!(!TopicFilter::compile("/finance").matches("finance"));
        assert!(TopicFilter::compile("a//b").matches("a//b"));
        assert!(TopicFilter::compile("").matches(""));
    }

    #[test]
    fn test_single_wildcard() {
        let t = TopicFilter::compile("a/+/c");
        assert!(t.matches("a/b/c"));
        assert!(t.matches("a/x/c"));
        assert!(!t.matches("a/b/d/c"));
        assert!(!t.matches("a/c"));
        assert!(!t.matches("a//c"));

        let t = TopicFilter::compile("sport/+");
        assert!(t.matches("sport/tennis"));
        assert!(!t.matches("sport"));
        assert!(!t.matches("sport/tennis/player1"));

        assert!(TopicFilter::compile("+").matches("finance"));
        assert!(!TopicFilter::compile("+").matches("/finance"));
        assert!(TopicFilter::compile("+/+").matches("sport/tennis"));
    }

    #[test]
    fn test_multi_wildcard() {
        let t = TopicFilter::compile("sport/tennis/player1/#");
        assert!(t.matches("sport/tennis/player1"));
        assert!(t.matches("sport/tennis/player1/ranking"));
        assert!(t.matches("sport/tennis/player1/score/wimbledon"));

        let t = TopicFilter::compile("sport/#");
        assert!(t.matches("sport"));
        assert!(t.matches("sport/"));
        assert!(t.matches("sport/tennis"));
        assert!(t.matches("sport/tennis/player1"));
        assert!(!t.matches("sports"));

        assert!(TopicFilter::compile("#").matches("sport"));
        assert!(TopicFilter::compile("#").matches("sport/tennis/player1"));

        let t = TopicFilter::compile("+/tennis/#");
        assert!(t.matches("sport/tennis/player1"));
        assert!(!t.matches("sport/hockey/player1"));
    }

    #[test]
    fn test_malformed_degrades_to_literal() {
        // '+' embedded in a level is not a wildcard
        let t = TopicFilter::compile("+abc");
        assert!(t.matches("+abc"));
        assert!(!t.matches("xabc"));

        let t = TopicFilter::compile("a+b/c");
        assert!(t.matches("a+b/c"));
        assert!(!t.matches("x/c"));

        // '#' is a wildcard only as the final level
        let t = TopicFilter::compile("#/x");
        assert!(t.matches("#/x"));
        assert!(!t.matches("a/x"));
        assert!(!t.matches("a/b/x"));

        let t = TopicFilter::compile("a#");
        assert!(t.matches("a#"));
        assert!(!t.matches("ab"));

        let t = TopicFilter::compile("a/#/b");
        assert!(t.matches("a/#/b"));
        assert!(!t.matches("a/x/b"));
    }

    #[test]
    fn test_levels() {
        let t = TopicFilter::compile("+/tennis/#");
        assert_eq!(
            t.levels(),
            &[FilterLevel::Single, FilterLevel::Literal("tennis".into()), FilterLevel::Multi]
        );
        assert!(t.levels()[0].is_wildcard());
        assert!(!t.levels()[1].is_wildcard());

        let t = TopicFilter::compile("a/#/b");
        assert!(t.levels().iter().all(|l| !l.is_wildcard()));
    }

    #[test]
    fn test_display() {
        let t = TopicFilter::compile("+/tennis/#");
        assert_eq!(t.to_string(), "+/tennis/#");
        assert_eq!(t.as_str(), "+/tennis/#");
        let raw: &str = t.raw();
        assert_eq!(raw, "+/tennis/#");
    }
}
