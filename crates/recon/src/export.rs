//! Renders a [`ReconResult`] into the downstream import files.
//!
//! Multi-row records follow the importer's continuation convention: the
//! first row of a record carries its identifying columns and later rows
//! leave them blank.

use crate::error::ReconError;
use crate::model::{NewVocabularyValue, ReconResult};

pub const ATTRIBUTES_FILE: &str = "attributes.csv";
pub const TEMPLATE_UPDATES_FILE: &str = "existing_template_updates.csv";
pub const NEW_TEMPLATES_FILE: &str = "new_templates.csv";
pub const VARIANTS_FILE: &str = "product_variant_import.csv";
pub const MISSES_FILE: &str = "missing_skus.csv";
pub const RESULT_FILE: &str = "reconciliation_result.json";

const LINE_ATTRIBUTE: &str = "attribute_line_ids/attribute_id/id";
const LINE_VALUES: &str = "attribute_line_ids/value_ids/id";

/// One output file, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFile {
    pub name: &'static str,
    pub contents: String,
}

/// Render all six outputs in a fixed order. Empty outputs still get a header.
pub fn render_outputs(result: &ReconResult) -> Result<Vec<RenderedFile>, ReconError> {
    Ok(vec![
        RenderedFile { name: ATTRIBUTES_FILE, contents: render_attributes(&result.catalog.new_values)? },
        RenderedFile { name: TEMPLATE_UPDATES_FILE, contents: render_template_updates(result)? },
        RenderedFile { name: NEW_TEMPLATES_FILE, contents: render_new_templates(result)? },
        RenderedFile { name: VARIANTS_FILE, contents: render_variants(result)? },
        RenderedFile { name: MISSES_FILE, contents: render_misses(result)? },
        RenderedFile { name: RESULT_FILE, contents: render_json(result)? },
    ])
}

fn io_err(e: impl std::fmt::Display) -> ReconError {
    ReconError::Io(e.to_string())
}

struct Table {
    writer: csv::Writer<Vec<u8>>,
}

impl Table {
    fn new(header: &[&str]) -> Result<Self, ReconError> {
        let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
        writer.write_record(header).map_err(io_err)?;
        Ok(Self { writer })
    }

    fn row<I, S>(&mut self, fields: I) -> Result<(), ReconError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        self.writer.write_record(fields).map_err(io_err)
    }

    fn finish(self) -> Result<String, ReconError> {
        let bytes = self.writer.into_inner().map_err(io_err)?;
        String::from_utf8(bytes).map_err(io_err)
    }
}

/// New vocabulary values, grouped by attribute in first-seen order.
pub fn render_attributes(values: &[NewVocabularyValue]) -> Result<String, ReconError> {
    let mut table = Table::new(&[
        "id",
        "value",
        "attribute",
        "attribute/id",
        "display_type",
        "create_variant",
    ])?;

    let mut order: Vec<&str> = Vec::new();
    for value in values {
        if !order.contains(&value.attribute_id.as_str()) {
            order.push(&value.attribute_id);
        }
    }

    for attribute_id in order {
        let rows = values.iter().filter(|v| v.attribute_id == attribute_id);
        for (i, value) in rows.enumerate() {
            let header = value.attribute_is_new && i == 0;
            let display = value.display_kind.to_string();
            table.row([
                value.value_id.as_str(),
                value.value.as_str(),
                if header { value.attribute_name.as_str() } else { "" },
                value.attribute_id.as_str(),
                if header { display.as_str() } else { "" },
                if header { "instantly" } else { "" },
            ])?;
        }
    }
    table.finish()
}

fn render_template_updates(result: &ReconResult) -> Result<String, ReconError> {
    let mut table = Table::new(&["id", "name", LINE_ATTRIBUTE, LINE_VALUES])?;
    let mut previous: Option<&str> = None;
    for update in &result.catalog.template_updates {
        let first = previous != Some(update.template_id.as_str());
        previous = Some(&update.template_id);
        table.row([
            if first { update.template_id.as_str() } else { "" },
            if first { update.template_name.as_str() } else { "" },
            update.attribute_id.as_str(),
            update.value_ids.join(",").as_str(),
        ])?;
    }
    table.finish()
}

fn render_new_templates(result: &ReconResult) -> Result<String, ReconError> {
    let mut table = Table::new(&[
        "id",
        "name",
        "categ_id/id",
        "type",
        "sale_ok",
        "list_price",
        LINE_ATTRIBUTE,
        LINE_VALUES,
    ])?;
    for template in &result.catalog.new_templates {
        let price = template.list_price.to_string();
        let head = [
            template.template_id.as_str(),
            template.name.as_str(),
            template.category_id.as_str(),
            template.product_type.as_str(),
            "True",
            price.as_str(),
        ];
        if template.lines.is_empty() {
            table.row(head.iter().copied().chain(["", ""]))?;
            continue;
        }
        for (i, line) in template.lines.iter().enumerate() {
            let values = line.value_ids.join(",");
            let tail = [line.attribute_id.as_str(), values.as_str()];
            if i == 0 {
                table.row(head.iter().copied().chain(tail))?;
            } else {
                table.row(std::iter::repeat("").take(head.len()).chain(tail))?;
            }
        }
    }
    table.finish()
}

fn render_variants(result: &ReconResult) -> Result<String, ReconError> {
    let mut table = Table::new(&[
        "id",
        "name",
        "product_template_variant_value_ids/id",
        "default_code",
        "standard_price",
    ])?;
    for variant in result.variant_records() {
        table.row([
            variant.variant_id.as_deref().unwrap_or(""),
            variant.template_name.as_str(),
            variant.value_ids.join(",").as_str(),
            variant.sku.as_str(),
            variant.price.to_string().as_str(),
        ])?;
    }
    table.finish()
}

fn render_misses(result: &ReconResult) -> Result<String, ReconError> {
    let mut table = Table::new(&["sku", "product_name", "source", "reason"])?;
    for miss in result.miss_records() {
        table.row([
            miss.sku,
            miss.product_name,
            miss.source.to_string(),
            miss.reason.to_string(),
        ])?;
    }
    table.finish()
}

fn render_json(result: &ReconResult) -> Result<String, ReconError> {
    serde_json::to_string_pretty(result).map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VariantMode;
    use crate::error::ResolutionFailure;
    use crate::model::{
        AttributeLine, CatalogUpdates, DisplayKind, NewTemplate, ProductRecord, ReconMeta,
        ReconSummary, ReconciliationOutcome, Source, TemplateAttributeUpdate, VariantRecord,
    };
    use rust_decimal::Decimal;

    fn result(catalog: CatalogUpdates, outcomes: Vec<ReconciliationOutcome>) -> ReconResult {
        ReconResult {
            meta: ReconMeta {
                config_name: "export test".into(),
                engine_version: "0.0.0".into(),
                run_at: "2026-01-01T00:00:00+00:00".into(),
                variant_mode: VariantMode::Upsert,
            },
            summary: ReconSummary::default(),
            catalog,
            outcomes,
            skipped_rows: vec![],
        }
    }

    fn new_value(attr: &str, value: &str, is_new: bool) -> NewVocabularyValue {
        NewVocabularyValue {
            attribute_id: format!("attr_{attr}"),
            attribute_name: attr.to_uppercase(),
            display_kind: DisplayKind::Radio,
            attribute_is_new: is_new,
            value: value.into(),
            value_id: format!("value_{attr}_{}", value.to_lowercase()),
        }
    }

    fn product(sku: &str, name: &str) -> ProductRecord {
        ProductRecord {
            index: 0,
            raw_name: name.into(),
            sku: sku.into(),
            price: Decimal::ZERO,
            display_name: name.into(),
            brand: None,
            source: Source::Pattern,
            attributes: vec![],
        }
    }

    fn lines(text: &str) -> Vec<&str> {
        text.lines().collect()
    }

    #[test]
    fn empty_result_still_has_headers() {
        let files = render_outputs(&result(CatalogUpdates::default(), vec![])).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.name).collect();
        assert_eq!(
            names,
            vec![
                ATTRIBUTES_FILE,
                TEMPLATE_UPDATES_FILE,
                NEW_TEMPLATES_FILE,
                VARIANTS_FILE,
                MISSES_FILE,
                RESULT_FILE
            ]
        );
        assert_eq!(lines(&files[4].contents), vec!["sku,product_name,source,reason"]);
        assert!(files[5].contents.contains("\"config_name\": \"export test\""));
    }

    #[test]
    fn attribute_rows_grouped_with_header_on_first_new_row() {
        let values = vec![
            new_value("color", "Red", true),
            new_value("flavor", "Kiwi", false),
            new_value("color", "Blue", true),
        ];
        let text = render_attributes(&values).unwrap();
        assert_eq!(
            lines(&text),
            vec![
                "id,value,attribute,attribute/id,display_type,create_variant",
                "value_color_red,Red,COLOR,attr_color,radio,instantly",
                "value_color_blue,Blue,,attr_color,,",
                "value_flavor_kiwi,Kiwi,,attr_flavor,,",
            ]
        );
    }

    #[test]
    fn new_templates_continue_on_following_rows() {
        let catalog = CatalogUpdates {
            new_templates: vec![
                NewTemplate {
                    template_id: "tmpl_nova".into(),
                    name: "Nova Salt".into(),
                    category_id: "cat_1".into(),
                    product_type: "consu".into(),
                    list_price: Decimal::new(1999, 2),
                    lines: vec![
                        AttributeLine {
                            attribute_id: "attr_flavor".into(),
                            value_ids: vec!["v1".into(), "v2".into()],
                        },
                        AttributeLine {
                            attribute_id: "attr_size".into(),
                            value_ids: vec!["v3".into()],
                        },
                    ],
                },
                NewTemplate {
                    template_id: "tmpl_widget".into(),
                    name: "Simple Widget".into(),
                    category_id: "cat_1".into(),
                    product_type: "consu".into(),
                    list_price: Decimal::new(500, 2),
                    lines: vec![],
                },
            ],
            ..Default::default()
        };
        let files = render_outputs(&result(catalog, vec![])).unwrap();
        assert_eq!(
            lines(&files[2].contents)[1..],
            [
                "tmpl_nova,Nova Salt,cat_1,consu,True,19.99,attr_flavor,\"v1,v2\"",
                ",,,,,,attr_size,v3",
                "tmpl_widget,Simple Widget,cat_1,consu,True,5.00,,",
            ]
        );
    }

    #[test]
    fn template_updates_name_each_template_once() {
        let update = |attr: &str| TemplateAttributeUpdate {
            template_id: "tpl_juice".into(),
            template_name: "ACME - Juice".into(),
            attribute_id: attr.into(),
            value_ids: vec![format!("{attr}_v")],
        };
        let catalog = CatalogUpdates {
            template_updates: vec![update("attr_a"), update("attr_b")],
            ..Default::default()
        };
        let files = render_outputs(&result(catalog, vec![])).unwrap();
        assert_eq!(
            lines(&files[1].contents)[1..],
            ["tpl_juice,ACME - Juice,attr_a,attr_a_v", ",,attr_b,attr_b_v"]
        );
    }

    #[test]
    fn variants_and_misses() {
        let outcomes = vec![
            ReconciliationOutcome::VariantUpdate(VariantRecord {
                variant_id: Some("__export__.pp_9".into()),
                template_name: "ACME - Juice".into(),
                value_ids: vec!["val_1".into(), "val_2".into()],
                sku: "SKU-1".into(),
                price: Decimal::new(1250, 2),
            }),
            ReconciliationOutcome::VariantUpdate(VariantRecord {
                variant_id: None,
                template_name: "Simple Widget".into(),
                value_ids: vec![],
                sku: "SKU-2".into(),
                price: Decimal::new(5, 0),
            }),
            ReconciliationOutcome::TemplateMiss { product: product("SKU-3", "Unknown Thing") },
            ReconciliationOutcome::AttributeMiss {
                product: product("", "ACME - Juice"),
                matched_template: "ACME - Juice".into(),
                failure: ResolutionFailure::AttributeCombination,
            },
        ];
        let files = render_outputs(&result(CatalogUpdates::default(), outcomes)).unwrap();
        assert_eq!(
            lines(&files[3].contents)[1..],
            [
                "__export__.pp_9,ACME - Juice,\"val_1,val_2\",SKU-1,12.50",
                ",Simple Widget,,SKU-2,5",
            ]
        );
        assert_eq!(
            lines(&files[4].contents)[1..],
            [
                "SKU-3,Unknown Thing,pattern,no_template_match",
                ",ACME - Juice,pattern,no_attribute_match",
            ]
        );
    }
}
