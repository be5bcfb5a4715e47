//! Dependency edge semantics.

/// A dependency edge from a node to one of its upstream inputs.
///
/// Two independent flags control scheduling:
///
/// - `immediate` — the dependent cannot become active until this dependency
///   is resolved (succeeded, or failed-and-tolerated).
/// - `tolerant` — the dependent may proceed even if this dependency fails.
///
/// The four combinations form the closed set the spec names:
///
/// | | tolerant=false | tolerant=true |
/// |--|--|--|
/// | immediate=true  | [`DependencyType::HARD`]    | [`DependencyType::TOLERANT`] |
/// | immediate=false | [`DependencyType::DELAYED`] | [`DependencyType::SOFT`]     |
///
/// `SOFT` is defined but reserved: the builder never emits it (see
/// `graph-builder`'s test asserting this), matching the source runtime's
/// behaviour exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DependencyType {
    pub immediate: bool,
    pub tolerant: bool,
}

impl DependencyType {
    pub const HARD: DependencyType = DependencyType {
        immediate: true,
        tolerant: false,
    };

    pub const TOLERANT: DependencyType = DependencyType {
        immediate: true,
        tolerant: true,
    };

    pub const SOFT: DependencyType = DependencyType {
        immediate: false,
        tolerant: true,
    };

    pub const DELAYED: DependencyType = DependencyType {
        immediate: false,
        tolerant: false,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_match_flag_pairs() {
        assert_eq!(DependencyType::HARD, DependencyType { immediate: true, tolerant: false });
        assert_eq!(DependencyType::TOLERANT, DependencyType { immediate: true, tolerant: true });
        assert_eq!(DependencyType::SOFT, DependencyType { immediate: false, tolerant: true });
        assert_eq!(DependencyType::DELAYED, DependencyType { immediate: false, tolerant: false });
    }
}
