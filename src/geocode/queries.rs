//! Query generation for the lookup stages.
//!
//! Deterministic: the same record and context always produce the same
//! ordered candidate list.

use super::types::PlaceContext;

/// A known place for content scanning: canonical display form plus the
/// lowercase needles that match it in free text.
pub struct PlaceKeyword {
    pub display: &'static str,
    pub needles: &'static [&'static str],
}

/// Default content-scan table: the major Turkish cities plus the
/// İstanbul quarters the scraper commonly encounters. Needles carry
/// ASCII fallbacks because scraped text is inconsistent about diacritics.
pub const PLACE_KEYWORDS: &[PlaceKeyword] = &[
    // 'İ'.to_lowercase() yields i + U+0307, so both forms are listed.
    PlaceKeyword { display: "İstanbul", needles: &["istanbul", "i\u{307}stanbul"] },
    PlaceKeyword { display: "Ankara", needles: &["ankara"] },
    PlaceKeyword { display: "İzmir", needles: &["izmir", "i\u{307}zmir"] },
    PlaceKeyword { display: "Bursa", needles: &["bursa"] },
    PlaceKeyword { display: "Antalya", needles: &["antalya"] },
    PlaceKeyword { display: "Adana", needles: &["adana"] },
    PlaceKeyword { display: "Konya", needles: &["konya"] },
    PlaceKeyword { display: "Gaziantep", needles: &["gaziantep"] },
    PlaceKeyword { display: "Şanlıurfa", needles: &["şanlıurfa", "sanliurfa"] },
    PlaceKeyword { display: "Kocaeli", needles: &["kocaeli"] },
    PlaceKeyword { display: "Mersin", needles: &["mersin"] },
    PlaceKeyword { display: "Diyarbakır", needles: &["diyarbakır", "diyarbakir"] },
    PlaceKeyword { display: "Hatay", needles: &["hatay"] },
    PlaceKeyword { display: "Manisa", needles: &["manisa"] },
    PlaceKeyword { display: "Kayseri", needles: &["kayseri"] },
    PlaceKeyword { display: "Samsun", needles: &["samsun"] },
    PlaceKeyword { display: "Balıkesir", needles: &["balıkesir", "balikesir"] },
    PlaceKeyword { display: "Kahramanmaraş", needles: &["kahramanmaraş", "kahramanmaras"] },
    PlaceKeyword { display: "Van", needles: &["van"] },
    PlaceKeyword { display: "Aydın", needles: &["aydın", "aydin"] },
    PlaceKeyword { display: "Tekirdağ", needles: &["tekirdağ", "tekirdag"] },
    PlaceKeyword { display: "Sakarya", needles: &["sakarya"] },
    PlaceKeyword { display: "Muğla", needles: &["muğla", "mugla"] },
    PlaceKeyword { display: "Eskişehir", needles: &["eskişehir", "eskisehir"] },
    PlaceKeyword { display: "Denizli", needles: &["denizli"] },
    PlaceKeyword { display: "Trabzon", needles: &["trabzon"] },
    PlaceKeyword { display: "Erzurum", needles: &["erzurum"] },
    PlaceKeyword { display: "Ordu", needles: &["ordu"] },
    PlaceKeyword { display: "Afyonkarahisar", needles: &["afyonkarahisar"] },
    // İstanbul quarters
    PlaceKeyword { display: "Fatih", needles: &["fatih"] },
    PlaceKeyword { display: "Balat", needles: &["balat"] },
    PlaceKeyword { display: "Fener", needles: &["fener"] },
    PlaceKeyword { display: "Ayvansaray", needles: &["ayvansaray"] },
];

/// Comma-join the non-empty parts.
fn join_parts(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(", ")
}

/// The single query used by the basic and OpenCage stages:
/// "title, district, city, country" with empty parts dropped.
pub fn basic_query(title: &str, ctx: &PlaceContext) -> String {
    join_parts(&[title, &ctx.district, &ctx.city, &ctx.country])
}

/// The ordered candidate list for the variant stages, most specific
/// first: district form, city form, the country-suffixed place-kind
/// forms, bare title, then content-scan augmentations. Deduplicated,
/// first occurrence wins.
pub fn variant_queries(
    title: &str,
    content: &str,
    ctx: &PlaceContext,
    keywords: &[PlaceKeyword],
) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |q: String| {
        if !out.contains(&q) {
            out.push(q);
        }
    };

    if !ctx.district.is_empty() {
        push(join_parts(&[title, &ctx.district, &ctx.city, &ctx.country]));
    }
    if !ctx.city.is_empty() {
        push(join_parts(&[title, &ctx.city, &ctx.country]));
    }
    push(join_parts(&[title, &ctx.country]));
    for kind in ["mahallesi", "semti", "meydanı", "caddesi"] {
        push(join_parts(&[&format!("{} {}", title, kind), &ctx.country]));
    }
    push(title.to_string());

    // Content scan: every table entry mentioned in the text adds a
    // "title, Place, country" candidate with canonical capitalization.
    let content_lower = content.to_lowercase();
    for keyword in keywords {
        if keyword.needles.iter().any(|n| content_lower.contains(n)) {
            push(join_parts(&[title, keyword.display, &ctx.country]));
        }
    }

    out
}
