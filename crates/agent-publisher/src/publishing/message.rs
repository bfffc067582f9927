use std::fmt::Write as _;

use super::domain::Property;
use super::registry::LanguageCode;

struct Labels {
    price: &'static str,
    location: &'static str,
    bedrooms: &'static str,
    bathrooms: &'static str,
    area: &'static str,
    call_to_action: &'static str,
}

fn labels(language: LanguageCode) -> Labels {
    match language {
        LanguageCode::En => Labels {
            price: "Price",
            location: "Location",
            bedrooms: "Bedrooms",
            bathrooms: "Bathrooms",
            area: "Area",
            call_to_action: "Contact us to schedule a visit.",
        },
        LanguageCode::Mr => Labels {
            price: "किंमत",
            location: "ठिकाण",
            bedrooms: "शयनकक्ष",
            bathrooms: "स्नानगृह",
            area: "क्षेत्रफळ",
            call_to_action: "भेट ठरवण्यासाठी आमच्याशी संपर्क साधा.",
        },
        LanguageCode::Hi => Labels {
            price: "कीमत",
            location: "स्थान",
            bedrooms: "शयनकक्ष",
            bathrooms: "बाथरूम",
            area: "क्षेत्रफल",
            call_to_action: "विज़िट तय करने के लिए हमसे संपर्क करें।",
        },
        LanguageCode::Gu => Labels {
            price: "કિંમત",
            location: "સ્થાન",
            bedrooms: "બેડરૂમ",
            bathrooms: "બાથરૂમ",
            area: "વિસ્તાર",
            call_to_action: "મુલાકાત નક્કી કરવા અમારો સંપર્ક કરો.",
        },
    }
}

/// Social post body for one language. Listing copy comes from the stored
/// translation when present and falls back to the source text.
pub fn compose_listing_post(property: &Property, language: LanguageCode) -> String {
    let labels = labels(language);
    let listing = &property.listing;
    let mut post = String::new();

    let _ = writeln!(post, "{}", property.title_for(language));
    let description = property.description_for(language).trim();
    if !description.is_empty() {
        let _ = writeln!(post, "\n{description}\n");
    }

    let _ = writeln!(post, "{}: {}", labels.price, format_price(listing.price));
    if !listing.location.trim().is_empty() {
        let _ = writeln!(post, "{}: {}", labels.location, listing.location.trim());
    }
    if let Some(bedrooms) = listing.bedrooms {
        let _ = writeln!(post, "{}: {}", labels.bedrooms, bedrooms);
    }
    if let Some(bathrooms) = listing.bathrooms {
        let _ = writeln!(post, "{}: {}", labels.bathrooms, bathrooms);
    }
    if let Some(area) = listing.area_sqft {
        let _ = writeln!(post, "{}: {} sq ft", labels.area, area);
    }

    post.push('\n');
    post.push_str(labels.call_to_action);
    post
}

/// Rupee amount with thousands separators, rounded to whole units.
pub fn format_price(amount: f64) -> String {
    let whole = amount.max(0.0).round() as u64;
    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    format!("₹{grouped}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publishing::domain::{AgentId, PropertyDraft, PropertyTranslation};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn property() -> Property {
        let mut translations = BTreeMap::new();
        translations.insert(
            LanguageCode::Hi,
            PropertyTranslation {
                title: "समुद्र के सामने 2BHK".to_string(),
                description: Some("सैरगाह के पास रोशन फ्लैट".to_string()),
            },
        );
        Property::new_draft(
            AgentId("agent-1".to_string()),
            PropertyDraft {
                title: "Sea-facing 2BHK".to_string(),
                description: "Bright flat near the promenade".to_string(),
                price: 8_500_000.0,
                location: "Bandra West".to_string(),
                bedrooms: Some(2),
                bathrooms: None,
                area_sqft: Some(950),
                property_type: None,
                images: Vec::new(),
                translations,
            },
            Utc::now(),
        )
    }

    #[test]
    fn formats_prices_with_separators() {
        assert_eq!(format_price(8_500_000.0), "₹8,500,000");
        assert_eq!(format_price(999.4), "₹999");
        assert_eq!(format_price(1000.0), "₹1,000");
    }

    #[test]
    fn english_post_uses_source_copy() {
        let post = compose_listing_post(&property(), LanguageCode::En);
        assert!(post.starts_with("Sea-facing 2BHK\n"));
        assert!(post.contains("Price: ₹8,500,000"));
        assert!(post.contains("Location: Bandra West"));
        assert!(post.contains("Area: 950 sq ft"));
        assert!(!post.contains("Bathrooms"));
    }

    #[test]
    fn localized_post_uses_translation_and_labels() {
        let post = compose_listing_post(&property(), LanguageCode::Hi);
        assert!(post.starts_with("समुद्र के सामने 2BHK"));
        assert!(post.contains("कीमत: ₹8,500,000"));
        assert!(post.contains("शयनकक्ष: 2"));
    }
}
