//! Built-in rule sets for the supported marketplaces.
//!
//! Selectors track each marketplace's current markup. When extraction starts
//! returning incomplete records for a source, capture a detail page, update the
//! selectors here and add a fixture under `tests/fixtures/`.

use rust_decimal::Decimal;

use super::{
    DEFAULT_MAX_LINKS, DetailRules, ExtractionRuleSet, FieldRule, LinkRule, MultiFieldRule,
    NavigationRule, PriceRule,
};
use crate::models::{MarketplaceSource, RecordField};

pub const SPEC_SEPARATOR: &str = ", ";
pub const REVIEW_SEPARATOR: &str = " | ";

/// Display currency of the catalog.
pub const TENGE_SUFFIX: &str = "₸";

/// Fixed RUB → KZT multiplier applied to ruble-priced marketplaces.
pub const RUB_TO_KZT: i64 = 6;

const DESKTOP_CHROME_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

pub fn all() -> Vec<ExtractionRuleSet> {
    vec![
        kaspi(),
        wildberries(),
        alfa(),
        olx(),
        ozon(),
        halyk_market(),
        lamoda(),
    ]
}

fn links(selector: &str) -> LinkRule {
    LinkRule {
        selector: selector.to_string(),
        exclude: Vec::new(),
        require: Vec::new(),
        max_links: DEFAULT_MAX_LINKS,
    }
}

fn tenge(strip: &[&str]) -> PriceRule {
    PriceRule::native("KZT", TENGE_SUFFIX, strip)
}

fn unsandboxed(timeout_secs: u64) -> NavigationRule {
    NavigationRule {
        timeout_secs,
        user_agent: None,
        sandbox: Some(false),
    }
}

fn desktop_agent(timeout_secs: u64) -> NavigationRule {
    NavigationRule {
        timeout_secs,
        user_agent: Some(DESKTOP_CHROME_UA.to_string()),
        sandbox: None,
    }
}

fn rule_set(
    source: MarketplaceSource,
    list_url_template: &str,
    links: LinkRule,
    detail: DetailRules,
    price: PriceRule,
    navigation: NavigationRule,
) -> ExtractionRuleSet {
    ExtractionRuleSet {
        source,
        list_url_template: list_url_template.to_string(),
        required_fields: RecordField::MANDATORY.to_vec(),
        links,
        detail,
        price,
        navigation,
    }
}

pub fn kaspi() -> ExtractionRuleSet {
    rule_set(
        MarketplaceSource::Kaspi,
        "https://kaspi.kz/shop/search/?text={query}",
        links(".item-card__name-link"),
        DetailRules {
            title: FieldRule::text(".item__heading"),
            price: FieldRule::text(".item__price-once"),
            image: FieldRule::attr(".item__slider-pic", "src"),
            description: Some(FieldRule::text(".item__description-text")),
            specifications: Some(MultiFieldRule::text(
                ".short-specifications__text",
                SPEC_SEPARATOR,
            )),
            reviews: Some(MultiFieldRule::text(
                ".reviews__review-text p",
                REVIEW_SEPARATOR,
            )),
        },
        tenge(&["₸"]),
        unsandboxed(120),
    )
}

pub fn wildberries() -> ExtractionRuleSet {
    rule_set(
        MarketplaceSource::Wildberries,
        "https://global.wildberries.ru/catalog?search={query}",
        links(".product-card__link"),
        DetailRules {
            title: FieldRule::text(".details-and-description__title"),
            price: FieldRule::text(
                r#"span.product-price-current__value[data-tag="productCurrentPrice"]"#,
            ),
            image: FieldRule::attr(".swiper-slide__img", "src"),
            description: Some(FieldRule::text("div.details-and-description__composition")),
            specifications: Some(MultiFieldRule::pairs(
                "div.full-details-info .full-details-item",
                r#"th[data-tag="name"]"#,
                r#"td[data-tag="value"]"#,
                SPEC_SEPARATOR,
            )),
            reviews: Some(MultiFieldRule::text(
                ".feedbacks-item-product__comment",
                REVIEW_SEPARATOR,
            )),
        },
        PriceRule::converted("RUB", Decimal::from(RUB_TO_KZT), TENGE_SUFFIX, &["₽"]),
        unsandboxed(120),
    )
}

pub fn alfa() -> ExtractionRuleSet {
    let mut link_rule = links(".product-item .title a");
    link_rule.exclude.push("/wishlist/add".to_string());

    rule_set(
        MarketplaceSource::Alfa,
        "https://alfa.kz/q/{query}",
        link_rule,
        DetailRules {
            title: FieldRule::text(".single-product-title"),
            price: FieldRule::text(".price .num"),
            image: FieldRule::attr(".gallery-holder img", "src"),
            description: Some(FieldRule::text(".tab-pane#description")),
            specifications: None,
            reviews: None,
        },
        tenge(&["₸"]),
        unsandboxed(120),
    )
}

pub fn olx() -> ExtractionRuleSet {
    rule_set(
        MarketplaceSource::Olx,
        "https://www.olx.kz/list/q-{query}/",
        links("a.css-z3gu2d"),
        DetailRules {
            title: FieldRule::text(r#"div[data-cy="ad_title"] h4"#),
            price: FieldRule::text(r#"div[data-testid="ad-price-container"] h3"#),
            image: FieldRule::attr(r#"div[data-testid="ad-photo"] img"#, "src"),
            description: Some(FieldRule::text(
                r#"div[data-testid="ad_description"] .css-1t507yq"#,
            )),
            specifications: None,
            reviews: None,
        },
        tenge(&["₸", "тг."]),
        unsandboxed(120),
    )
}

pub fn ozon() -> ExtractionRuleSet {
    rule_set(
        MarketplaceSource::Ozon,
        "https://www.ozon.ru/search/?from_global=true&text={query}",
        links("a.tile-hover-target"),
        DetailRules {
            title: FieldRule::text(r#"h1[itemprop="name"]"#),
            price: FieldRule::text(r#"span[itemprop="price"]"#),
            image: FieldRule::attr(r#"img[itemprop="image"]"#, "src"),
            description: Some(FieldRule::text(r#"div[itemprop="description"]"#)),
            specifications: Some(MultiFieldRule::pairs(
                r#"dl[itemprop="additionalProperty"]"#,
                "dt",
                "dd",
                SPEC_SEPARATOR,
            )),
            reviews: Some(MultiFieldRule::text(
                r#"div[itemprop="reviewBody"]"#,
                REVIEW_SEPARATOR,
            )),
        },
        // The global storefront already quotes tenge for Kazakhstan visitors.
        tenge(&["₸"]),
        desktop_agent(120),
    )
}

pub fn halyk_market() -> ExtractionRuleSet {
    rule_set(
        MarketplaceSource::HalykMarket,
        "https://halykmarket.kz/search?r46_search_query={query}&page=1",
        links(".product-card a"),
        DetailRules {
            title: FieldRule::text(".desc-name"),
            price: FieldRule::text(".desc-price-value"),
            image: FieldRule::attr(".product-slide img", "src"),
            description: Some(FieldRule::text(".desc-name")),
            // Halyk renders the attribute name in __value and its value in __label.
            specifications: Some(MultiFieldRule::pairs(
                ".chars-item__children",
                ".chars-item__value",
                ".chars-item__label",
                SPEC_SEPARATOR,
            )),
            reviews: Some(MultiFieldRule::text(
                ".product-review-info-block-texts-data-description",
                REVIEW_SEPARATOR,
            )),
        },
        tenge(&["₸"]),
        desktop_agent(120),
    )
}

pub fn lamoda() -> ExtractionRuleSet {
    let mut link_rule = links(".x-product-card__link");
    link_rule.require.push("/p/".to_string());

    rule_set(
        MarketplaceSource::Lamoda,
        "https://www.lamoda.kz/catalogsearch/result/?q={query}",
        link_rule,
        DetailRules {
            title: FieldRule::text("h1.x-product-card__product-name"),
            price: FieldRule::text(".x-product-card-description__price-new"),
            image: FieldRule::attr(".x-product-card__pic-img", "src"),
            description: Some(FieldRule::text("div._content_1q4q9_61")),
            specifications: Some(MultiFieldRule::pairs(
                "p._item_ajirn_2",
                "._attribute_ajirn_7",
                "._value_ajirn_27",
                SPEC_SEPARATOR,
            )),
            reviews: Some(MultiFieldRule::text(
                "div._root_1lyxm_6 ._description_1lyxm_42",
                REVIEW_SEPARATOR,
            )),
        },
        tenge(&["₸"]),
        NavigationRule {
            timeout_secs: 90,
            user_agent: None,
            sandbox: None,
        },
    )
}
