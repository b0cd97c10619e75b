/// Typed form of the signed delivery result: 0 not delivered, negative errno, positive
/// bytes consumed.
///
/// `Delivered(0)`, `Failed(0)` and a positive `Failed` are out of contract;
/// [`Outcome::normalize`] maps them by their raw value, and the queue applies it to
/// everything a capability returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    NotDelivered,
    Delivered(usize),
    Failed(i32),
}

impl Outcome {
    pub fn from_raw(raw: isize) -> Self {
        match raw {
            0 => Outcome::NotDelivered,
            n if n > 0 => Outcome::Delivered(n as usize),
            n => Outcome::Failed(i32::try_from(n).unwrap_or(i32::MIN)),
        }
    }

    pub fn as_raw(self) -> isize {
        match self {
            Outcome::NotDelivered => 0,
            Outcome::Delivered(n) => isize::try_from(n).unwrap_or(isize::MAX),
            Outcome::Failed(errno) => errno as isize,
        }
    }

    pub fn normalize(self) -> Self {
        Outcome::from_raw(self.as_raw())
    }

    /// `NotDelivered` is the only unresolved outcome.
    pub fn is_resolved(self) -> bool {
        !matches!(self, Outcome::NotDelivered)
    }

    pub fn is_delivered(self) -> bool {
        matches!(self, Outcome::Delivered(_))
    }
}

impl From<isize> for Outcome {
    fn from(raw: isize) -> Self {
        Outcome::from_raw(raw)
    }
}

impl From<Outcome> for isize {
    fn from(outcome: Outcome) -> Self {
        outcome.as_raw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_sign_selects_variant() {
        assert_eq!(Outcome::from_raw(0), Outcome::NotDelivered);
        assert_eq!(Outcome::from_raw(1514), Outcome::Delivered(1514));
        assert_eq!(Outcome::from_raw(-5), Outcome::Failed(-5));
        assert_eq!(Outcome::Failed(-22).as_raw(), -22);
        assert_eq!(isize::from(Outcome::NotDelivered), 0);
    }

    #[test]
    fn only_zero_is_unresolved() {
        assert!(!Outcome::NotDelivered.is_resolved());
        assert!(Outcome::Failed(-1).is_resolved());
        assert!(Outcome::Delivered(60).is_resolved());
        assert!(!Outcome::Failed(-1).is_delivered());
    }

    #[test]
    fn normalize_follows_the_raw_value() {
        assert_eq!(Outcome::Delivered(0).normalize(), Outcome::NotDelivered);
        assert!(!Outcome::Delivered(0).normalize().is_resolved());
        assert_eq!(Outcome::Failed(0).normalize(), Outcome::NotDelivered);
        assert_eq!(Outcome::Failed(5).normalize(), Outcome::Delivered(5));

        for outcome in [
            Outcome::NotDelivered,
            Outcome::Delivered(1),
            Outcome::Failed(-11),
            Outcome::Delivered(0),
            Outcome::Failed(7),
        ] {
            let normal = outcome.normalize();
            assert_eq!(normal.as_raw(), outcome.as_raw());
            assert_eq!(Outcome::from_raw(normal.as_raw()), normal);
        }
    }
}
