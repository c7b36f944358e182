//! Static fallback card data
//!
//! This module contains the bundled card table served when the remote card
//! source is unreachable. Fallback cards are never written into the cache.

use super::{BonusKind, CardRecord, SignupBonus};

/// Static description of a bundled card
///
/// Uses `&'static str` fields so the table can be initialized statically;
/// convert to an owned [`CardRecord`] with `CardRecord::from`.
#[derive(Debug, Clone, Copy)]
pub struct FallbackCard {
    pub id: &'static str,
    pub name: &'static str,
    pub issuer: &'static str,
    pub reward_rates: &'static [(&'static str, f64)],
    pub annual_fee: f64,
    pub perks: &'static [&'static str],
    pub signup_bonus: Option<(f64, BonusKind, f64, u32)>,
    pub description: &'static str,
}

/// Static array of bundled cards
pub static FALLBACK_CARDS: [FallbackCard; 8] = [
    FallbackCard {
        id: "chase-sapphire-preferred",
        name: "Chase Sapphire Preferred",
        issuer: "Chase",
        reward_rates: &[("travel", 2.0), ("dining", 3.0), ("streaming", 3.0), ("everything", 1.0)],
        annual_fee: 95.0,
        perks: &["Trip cancellation insurance", "Primary rental car coverage", "No foreign transaction fees"],
        signup_bonus: Some((60000.0, BonusKind::Points, 4000.0, 3)),
        description: "Flexible travel points with strong dining rewards.",
    },
    FallbackCard {
        id: "chase-freedom-unlimited",
        name: "Chase Freedom Unlimited",
        issuer: "Chase",
        reward_rates: &[("dining", 3.0), ("drugstores", 3.0), ("everything", 1.5)],
        annual_fee: 0.0,
        perks: &["Purchase protection", "Extended warranty"],
        signup_bonus: Some((200.0, BonusKind::Cash, 500.0, 3)),
        description: "No annual fee card earning 1.5% on everything.",
    },
    FallbackCard {
        id: "amex-gold",
        name: "American Express Gold Card",
        issuer: "American Express",
        reward_rates: &[("dining", 4.0), ("groceries", 4.0), ("travel", 3.0), ("everything", 1.0)],
        annual_fee: 325.0,
        perks: &["Dining credit", "Uber Cash", "No foreign transaction fees"],
        signup_bonus: Some((60000.0, BonusKind::Points, 6000.0, 6)),
        description: "Premium rewards for restaurants and supermarkets.",
    },
    FallbackCard {
        id: "amex-blue-cash-preferred",
        name: "Blue Cash Preferred",
        issuer: "American Express",
        reward_rates: &[("groceries", 6.0), ("streaming", 6.0), ("gas", 3.0), ("everything", 1.0)],
        annual_fee: 95.0,
        perks: &["Return protection", "Car rental loss and damage insurance"],
        signup_bonus: Some((250.0, BonusKind::Cash, 3000.0, 6)),
        description: "Cash back card for households with heavy grocery spend.",
    },
    FallbackCard {
        id: "citi-double-cash",
        name: "Citi Double Cash",
        issuer: "Citi",
        reward_rates: &[("everything", 2.0)],
        annual_fee: 0.0,
        perks: &["Balance transfer offer"],
        signup_bonus: None,
        description: "Flat 2% cash back: 1% when you buy and 1% when you pay.",
    },
    FallbackCard {
        id: "capital-one-venture",
        name: "Capital One Venture Rewards",
        issuer: "Capital One",
        reward_rates: &[("travel", 5.0), ("everything", 2.0)],
        annual_fee: 95.0,
        perks: &["Global Entry credit", "No foreign transaction fees"],
        signup_bonus: Some((75000.0, BonusKind::Miles, 4000.0, 3)),
        description: "Simple travel miles on every purchase.",
    },
    FallbackCard {
        id: "discover-it-cash-back",
        name: "Discover it Cash Back",
        issuer: "Discover",
        reward_rates: &[("rotating", 5.0), ("everything", 1.0)],
        annual_fee: 0.0,
        perks: &["Cashback match in first year", "Free credit score"],
        signup_bonus: None,
        description: "Quarterly rotating 5% categories.",
    },
    FallbackCard {
        id: "wells-fargo-autograph",
        name: "Wells Fargo Autograph",
        issuer: "Wells Fargo",
        reward_rates: &[("dining", 3.0), ("travel", 3.0), ("gas", 3.0), ("streaming", 3.0), ("everything", 1.0)],
        annual_fee: 0.0,
        perks: &["Cell phone protection"],
        signup_bonus: Some((20000.0, BonusKind::Points, 1000.0, 3)),
        description: "Broad 3x categories without an annual fee.",
    },
];

impl From<&FallbackCard> for CardRecord {
    fn from(card: &FallbackCard) -> Self {
        CardRecord {
            id: card.id.to_string(),
            name: card.name.to_string(),
            issuer: card.issuer.to_string(),
            reward_rates: card
                .reward_rates
                .iter()
                .map(|(category, rate)| (category.to_string(), *rate))
                .collect(),
            annual_fee: card.annual_fee,
            perks: card.perks.iter().map(|perk| perk.to_string()).collect(),
            signup_bonus: card
                .signup_bonus
                .map(|(amount, kind, spend_requirement, months)| SignupBonus {
                    amount,
                    kind,
                    spend_requirement,
                    months,
                }),
            description: card.description.to_string(),
        }
    }
}

/// Get all bundled cards as owned records
pub fn fallback_cards() -> Vec<CardRecord> {
    FALLBACK_CARDS.iter().map(CardRecord::from).collect()
}

/// Get a bundled card by its ID
///
/// # Returns
///
/// Returns `Some(CardRecord)` if found, `None` otherwise
pub fn fallback_card_by_id(id: &str) -> Option<CardRecord> {
    FALLBACK_CARDS
        .iter()
        .find(|card| card.id == id)
        .map(CardRecord::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_fallback_ids_are_unique() {
        let ids: HashSet<&str> = FALLBACK_CARDS.iter().map(|card| card.id).collect();
        assert_eq!(ids.len(), FALLBACK_CARDS.len(), "Fallback IDs should be unique");
    }

    #[test]
    fn test_fallback_cards_convert_all_entries() {
        let cards = fallback_cards();
        assert_eq!(cards.len(), FALLBACK_CARDS.len());
        assert!(cards.iter().all(|card| !card.name.is_empty()));
        assert!(cards.iter().all(|card| !card.reward_rates.is_empty()));
    }

    #[test]
    fn test_fallback_card_by_id_found() {
        let card = fallback_card_by_id("citi-double-cash").expect("Card should exist");
        assert_eq!(card.issuer, "Citi");
        assert_eq!(card.reward_rate("anything"), 2.0);
        assert!(card.signup_bonus.is_none());
    }

    #[test]
    fn test_fallback_card_by_id_not_found() {
        assert!(fallback_card_by_id("no-such-card").is_none());
    }

    #[test]
    fn test_signup_bonus_is_converted() {
        let card = fallback_card_by_id("capital-one-venture").unwrap();
        let bonus = card.signup_bonus.expect("Venture should carry a bonus");
        assert_eq!(bonus.kind, BonusKind::Miles);
        assert_eq!(bonus.months, 3);
    }
}
