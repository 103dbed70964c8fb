//! Built-in dialects.

use crate::filter::{Argument, ArgumentKind, Filter, ValueType};
use crate::object::Object;
use crate::tag::{Language, Tag, TagKind};
use crate::Spec;

use ValueType::{Boolean, Float, Integer, Reference, String};

fn filter(arguments: &[Argument]) -> Filter {
    arguments
        .iter()
        .cloned()
        .fold(Filter::new(), |filter, argument| filter.argument(argument))
}

fn text() -> Argument {
    Argument::new(&[String, Reference]).required()
}

fn number() -> Argument {
    Argument::new(&[Integer, Float, Reference]).required()
}

fn integer() -> Argument {
    Argument::new(&[Integer, Reference]).required()
}

const PLAIN_FILTERS: &[&str] = &[
    "abs",
    "capitalize",
    "ceil",
    "compact",
    "downcase",
    "escape",
    "escape_once",
    "first",
    "floor",
    "last",
    "lstrip",
    "newline_to_br",
    "reverse",
    "rstrip",
    "size",
    "sort_natural",
    "strip",
    "strip_html",
    "strip_newlines",
    "uniq",
    "upcase",
    "url_decode",
    "url_encode",
];

impl Spec {
    /// Tags and filters every Liquid implementation ships.
    pub fn standard() -> Self {
        let mut spec = Spec::new()
            .tag("comment", Tag::new(TagKind::Comment).block())
            .tag("raw", Tag::new(TagKind::Raw).block())
            .tag("if", Tag::new(TagKind::Control).block().arguments())
            .tag("unless", Tag::new(TagKind::Control).block().arguments())
            .tag("case", Tag::new(TagKind::Control).block().arguments())
            .tag(
                "elsif",
                Tag::new(TagKind::Control).arguments().parents(&["if", "unless"]),
            )
            .tag("when", Tag::new(TagKind::Control).arguments().parents(&["case"]))
            .tag(
                "else",
                Tag::new(TagKind::Control).parents(&["if", "unless", "case", "for"]),
            )
            .tag(
                "for",
                Tag::new(TagKind::Iteration)
                    .block()
                    .arguments()
                    .parameter("limit", true)
                    .parameter("offset", true)
                    .parameter("reversed", false),
            )
            .tag(
                "tablerow",
                Tag::new(TagKind::Iteration)
                    .block()
                    .arguments()
                    .parameter("cols", true)
                    .parameter("limit", true)
                    .parameter("offset", true),
            )
            .tag("break", Tag::new(TagKind::Other).singular())
            .tag("continue", Tag::new(TagKind::Other).singular())
            .tag("assign", Tag::new(TagKind::Variable).arguments())
            .tag("capture", Tag::new(TagKind::Variable).block())
            .tag("increment", Tag::new(TagKind::Variable))
            .tag("decrement", Tag::new(TagKind::Variable))
            .tag("echo", Tag::new(TagKind::Output).arguments())
            .tag("cycle", Tag::new(TagKind::Other).arguments())
            .tag("include", Tag::new(TagKind::Import).arguments())
            .tag("render", Tag::new(TagKind::Import).arguments())
            .tag("liquid", Tag::new(TagKind::Other).arguments());

        for name in PLAIN_FILTERS {
            spec = spec.filter(name, Filter::new());
        }

        spec.filter("append", filter(&[text()]))
            .filter("prepend", filter(&[text()]))
            .filter("remove", filter(&[text()]))
            .filter("remove_first", filter(&[text()]))
            .filter("split", filter(&[text()]))
            .filter("map", filter(&[text()]))
            .filter("date", filter(&[text()]))
            .filter("replace", filter(&[text(), text()]))
            .filter("replace_first", filter(&[text(), text()]))
            .filter("plus", filter(&[number()]))
            .filter("minus", filter(&[number()]))
            .filter("times", filter(&[number()]))
            .filter("divided_by", filter(&[number()]))
            .filter("modulo", filter(&[number()]))
            .filter("at_least", filter(&[number()]))
            .filter("at_most", filter(&[number()]))
            .filter("round", filter(&[Argument::new(&[Integer, Reference])]))
            .filter("join", filter(&[Argument::new(&[String, Reference])]))
            .filter("sort", filter(&[Argument::new(&[String, Reference])]))
            .filter("concat", filter(&[Argument::new(&[Reference]).required()]))
            .filter(
                "slice",
                filter(&[integer(), Argument::new(&[Integer, Reference])]),
            )
            .filter(
                "truncate",
                filter(&[integer(), Argument::new(&[String, Reference])]),
            )
            .filter(
                "truncatewords",
                filter(&[integer(), Argument::new(&[String, Reference])]),
            )
            .filter(
                "where",
                filter(&[text(), Argument::new(&[String, Integer, Float, Boolean, Reference])]),
            )
            .filter(
                "default",
                filter(&[
                    Argument::new(&[]).required(),
                    Argument::new(&[Boolean]).kind(ArgumentKind::Parameter),
                ]),
            )
    }

    /// The standard dialect extended with Shopify theme tags and objects.
    pub fn shopify() -> Self {
        let image = Object::with(&["alt", "height", "id", "src", "width"]);
        let variant = Object::with(&["available", "id", "price", "sku", "title"]);

        let extension = Spec::new()
            .tag("schema", Tag::new(TagKind::Embedded).block().language(Language::Json))
            .tag("style", Tag::new(TagKind::Embedded).block().language(Language::Css))
            .tag(
                "stylesheet",
                Tag::new(TagKind::Embedded).block().language(Language::Css),
            )
            .tag(
                "javascript",
                Tag::new(TagKind::Embedded).block().language(Language::Javascript),
            )
            .tag("form", Tag::new(TagKind::Other).block().arguments())
            .tag("paginate", Tag::new(TagKind::Other).block().arguments())
            .tag("section", Tag::new(TagKind::Import).arguments())
            .tag("layout", Tag::new(TagKind::Import).arguments())
            .filter("money", Filter::new())
            .filter("json", Filter::new())
            .filter("handleize", Filter::new())
            .filter("asset_url", Filter::new())
            .filter("img_url", filter(&[text()]))
            .filter(
                "image_url",
                filter(&[Argument::new(&[]).kind(ArgumentKind::Parameter)]),
            )
            .filter("t", filter(&[Argument::new(&[]).kind(ArgumentKind::Spread)]))
            .object(
                "product",
                Object::with(&[
                    "available",
                    "description",
                    "handle",
                    "id",
                    "price",
                    "tags",
                    "title",
                    "url",
                    "vendor",
                ])
                .property("featured_image", image.clone())
                .property("images", image)
                .property("variants", variant.clone())
                .property("selected_or_first_available_variant", variant),
            )
            .object(
                "collection",
                Object::with(&["description", "handle", "id", "products", "title", "url"]),
            )
            .object("cart", Object::with(&["item_count", "items", "note", "total_price"]))
            .object("shop", Object::with(&["currency", "domain", "email", "name", "url"]))
            .object("settings", Object::any())
            .object("section", Object::any())
            .associate("script")
            .associate("style");

        Spec::standard().merge(extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_has_core_tags() {
        let spec = Spec::standard();
        for name in ["if", "for", "assign", "comment", "raw", "case", "when"] {
            assert!(spec.tags.contains_key(name), "missing {name}");
        }
        assert!(spec.objects.is_empty());
        assert!(spec.associates.is_empty());
    }

    #[test]
    fn test_standard_placement() {
        let spec = Spec::standard();
        assert!(spec.tags["else"].has_placement());
        assert!(spec.tags["when"].parents.contains(&"case".to_string()));
        assert!(!spec.tags["if"].has_placement());
    }

    #[test]
    fn test_shopify_extends_standard() {
        let spec = Spec::shopify();
        assert!(spec.tags.contains_key("if"));
        assert_eq!(spec.tags["schema"].language, Some(Language::Json));
        assert!(spec.objects.contains_key("product"));
        assert!(spec.filters.contains_key("money"));
    }
}
