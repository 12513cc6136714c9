use serde::{Deserialize, Serialize};

/// Net advantage state for a d20 roll. Sources do not stack: any amount
/// of advantage cancels any amount of disadvantage exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Vantage {
    #[default]
    Normal,
    Advantage,
    Disadvantage,
}

impl Vantage {
    pub fn combine(self, other: Vantage) -> Vantage {
        use Vantage::*;
        match (self, other) {
            (Advantage, Disadvantage) | (Disadvantage, Advantage) => Normal,
            (Normal, x) => x,
            (x, Normal) => x,
            (Advantage, Advantage) => Advantage,
            (Disadvantage, Disadvantage) => Disadvantage,
        }
    }

    pub fn advantage_if(flag: bool) -> Vantage {
        if flag {
            Vantage::Advantage
        } else {
            Vantage::Normal
        }
    }

    pub fn disadvantage_if(flag: bool) -> Vantage {
        if flag {
            Vantage::Disadvantage
        } else {
            Vantage::Normal
        }
    }

    /// Pick the effective roll out of a pair rolled for this vantage.
    pub fn pick(self, first: i64, second: i64) -> i64 {
        match self {
            Vantage::Normal => first,
            Vantage::Advantage => first.max(second),
            Vantage::Disadvantage => first.min(second),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advantage_and_disadvantage_cancel_exactly() {
        assert_eq!(
            Vantage::Advantage.combine(Vantage::Disadvantage),
            Vantage::Normal
        );
        assert_eq!(
            Vantage::Disadvantage.combine(Vantage::Advantage),
            Vantage::Normal
        );
        assert_eq!(
            Vantage::Advantage.combine(Vantage::Advantage),
            Vantage::Advantage
        );
        assert_eq!(Vantage::Normal.combine(Vantage::Normal), Vantage::Normal);
    }

    #[test]
    fn pick_respects_vantage() {
        assert_eq!(Vantage::Normal.pick(7, 15), 7);
        assert_eq!(Vantage::Advantage.pick(7, 15), 15);
        assert_eq!(Vantage::Disadvantage.pick(7, 15), 7);
    }
}
