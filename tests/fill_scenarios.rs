mod common;

use bidfill::{Error, FieldId, FillOptions, OnMissing, RuleSpec, Strategy, WarningKind};
use common::*;

const COMPANY: &str = "智慧足迹数据科技有限公司";

fn defaults() -> FillOptions {
    FillOptions::default()
}

#[test]
fn bracketed_project_name_in_one_run() {
    let input = Template::new().text("根据贵方为（项目名称）项目采购...").build();
    let values = values(&[(FieldId::ProjectName, "智能办公系统采购项目")]);
    let (stats, output) = fill_ok(&input, &values, &defaults());

    let xml = entry(&output, DOCUMENT).unwrap();
    assert_eq!(paragraphs(&xml), ["根据贵方为（智能办公系统采购项目）项目采购..."]);
    assert_eq!(stats.total_substitutions, 1);
    assert_eq!(stats.per_field.get(&FieldId::ProjectName), Some(&1));
    assert_eq!(stats.paragraphs_changed, 1);
}

#[test]
fn bracketed_number_keeps_label_formatting() {
    let input = Template::new()
        .block(para(&[
            run("根据磋商公告（"),
            styled(ITALIC_UNDERLINE, "采购编号"),
            run("），"),
        ]))
        .build();
    let values = values(&[(FieldId::ProjectNumber, "GXTC-C-2025-001")]);
    let (_, output) = fill_ok(&input, &values, &defaults());

    let xml = entry(&output, DOCUMENT).unwrap();
    let runs = runs(&xml, 0);
    assert_eq!(runs.len(), 3);
    assert_eq!(runs[0], RunInfo { text: "根据磋商公告（".into(), italic: false, underline: false });
    assert_eq!(runs[1], RunInfo { text: "GXTC-C-2025-001".into(), italic: true, underline: true });
    assert_eq!(runs[2], RunInfo { text: "），".into(), italic: false, underline: false });
}

#[test]
fn seal_annotation_survives_and_value_is_not_underlined() {
    let input = Template::new()
        .block(para(&[
            run("供应商名称（加盖公章）："),
            styled(UNDERLINE, "____________________"),
        ]))
        .build();
    let values = values(&[(FieldId::CompanyName, COMPANY)]);
    let (_, output) = fill_ok(&input, &values, &defaults());

    let xml = entry(&output, DOCUMENT).unwrap();
    assert_eq!(paragraphs(&xml), [format!("供应商名称（加盖公章）：{COMPANY}")]);
    let runs = runs(&xml, 0);
    assert!(runs.iter().all(|r| !r.underline));
    assert!(!xml.contains('_'));
}

#[test]
fn dual_field_line_gets_separators_and_fixed_spacing() {
    let line = format!("电话{}电子邮件", " ".repeat(34));
    let input = Template::new().text(&line).build();
    let values = values(&[(FieldId::Phone, "010-63271000"), (FieldId::Email, "ops@example.com")]);
    let (stats, output) = fill_ok(&input, &values, &defaults());

    let xml = entry(&output, DOCUMENT).unwrap();
    assert_eq!(paragraphs(&xml), ["电话：010-63271000    电子邮件：ops@example.com"]);
    assert_eq!(stats.total_substitutions, 2);
}

#[test]
fn filled_paragraph_is_left_alone() {
    let input = Template::new().text(&format!("供应商名称：{COMPANY}")).build();
    let values = values(&[(FieldId::CompanyName, COMPANY)]);
    let (stats, output) = fill_ok(&input, &values, &defaults());

    assert_eq!(entry(&output, DOCUMENT), entry(&input, DOCUMENT));
    assert_eq!(stats.total_substitutions, 0);
    assert_eq!(stats.paragraphs_changed, 0);
}

#[test]
fn missing_value_is_blanked_with_a_warning() {
    let input = Template::new().text("传真：____________________").build();
    let (stats, output) = fill_ok(&input, &values(&[]), &defaults());

    let xml = entry(&output, DOCUMENT).unwrap();
    assert_eq!(paragraphs(&xml), ["传真："]);
    let warnings: Vec<_> = stats.warnings_of(WarningKind::UnresolvedField).collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].field, Some(FieldId::Fax));
    assert_eq!(stats.total_substitutions, 0);
}

#[test]
fn literal_policy_writes_marker() {
    let input = Template::new().text("传真：________").build();
    let options = FillOptions { on_missing: OnMissing::Literal, ..defaults() };
    let (_, output) = fill_ok(&input, &values(&[]), &options);
    assert_eq!(paragraphs(&entry(&output, DOCUMENT).unwrap()), ["传真：未填写"]);
}

#[test]
fn skip_policy_keeps_paragraph_bytes() {
    let original = text_para("传真：________");
    let input = Template::new().block(original.clone()).build();
    let options = FillOptions { on_missing: OnMissing::Skip, ..defaults() };
    let (stats, output) = fill_ok(&input, &values(&[]), &options);

    assert!(entry(&output, DOCUMENT).unwrap().contains(&original));
    assert_eq!(stats.warnings_of(WarningKind::UnresolvedField).count(), 1);
    assert_eq!(stats.residue_count(), 1);
}

#[test]
fn date_field_defaults_to_skip() {
    let input = Template::new().text("日期：________").build();
    let (stats, output) = fill_ok(&input, &values(&[]), &defaults());
    assert_eq!(entry(&output, DOCUMENT), entry(&input, DOCUMENT));
    assert_eq!(stats.residue_count(), 1);
}

#[test]
fn strict_mode_refuses_to_write_residue() {
    let input = Template::new().text("传真：________").build();
    let options = FillOptions { on_missing: OnMissing::Skip, strict: true, ..defaults() };
    let (result, output) = fill_bytes(&input, &values(&[]), &options);
    assert!(matches!(result, Err(Error::Residue(1))));
    assert!(output.is_none());
}

#[test]
fn strict_mode_passes_when_everything_is_filled() {
    let input = Template::new().text("传真：________").build();
    let options = FillOptions { strict: true, ..defaults() };
    let (result, output) = fill_bytes(&input, &values(&[(FieldId::Fax, "010-1")]), &options);
    assert!(result.is_ok());
    assert!(output.is_some());
}

#[test]
fn seal_after_value_is_spaced_by_four() {
    let input = Template::new().text("投标人：__________（盖章）").build();
    let values = values(&[(FieldId::CompanyName, COMPANY)]);
    let (_, output) = fill_ok(&input, &values, &defaults());
    assert_eq!(
        paragraphs(&entry(&output, DOCUMENT).unwrap()),
        [format!("投标人：{COMPANY}    （盖章）")]
    );
}

#[test]
fn multi_field_line_is_filled_and_spaced() {
    let input = Template::new().text("电话：________        传真：________").build();
    let values = values(&[(FieldId::Phone, "010-63271000"), (FieldId::Fax, "010-63271001")]);
    let (stats, output) = fill_ok(&input, &values, &defaults());
    assert_eq!(
        paragraphs(&entry(&output, DOCUMENT).unwrap()),
        ["电话：010-63271000    传真：010-63271001"]
    );
    assert_eq!(stats.total_substitutions, 2);
}

#[test]
fn label_with_nothing_after_gets_value_appended() {
    let input = Template::new().text("法定代表人：").build();
    let values = values(&[(FieldId::LegalRepresentative, "张三")]);
    let (_, output) = fill_ok(&input, &values, &defaults());
    assert_eq!(paragraphs(&entry(&output, DOCUMENT).unwrap()), ["法定代表人：张三"]);
}

#[test]
fn trailing_spaces_receive_separator_and_value() {
    let input = Template::new().text(&format!("地址{}", " ".repeat(24))).build();
    let values = values(&[(FieldId::Address, "北京市西城区")]);
    let (_, output) = fill_ok(&input, &values, &defaults());
    assert_eq!(paragraphs(&entry(&output, DOCUMENT).unwrap()), ["地址：北京市西城区"]);
}

#[test]
fn placeholder_followed_by_text_keeps_the_text() {
    let input = Template::new().text("邮政编码：______（六位数字）").build();
    let values = values(&[(FieldId::PostalCode, "100032")]);
    let (_, output) = fill_ok(&input, &values, &defaults());
    assert_eq!(
        paragraphs(&entry(&output, DOCUMENT).unwrap()),
        ["邮政编码：100032（六位数字）"]
    );
}

#[test]
fn skip_keyword_bypasses_paragraph() {
    let original = text_para("招标代理机构（项目名称）");
    let input = Template::new().block(original.clone()).build();
    let values = values(&[(FieldId::ProjectName, "智能办公系统采购项目")]);
    let (stats, output) = fill_ok(&input, &values, &defaults());
    assert_eq!(entry(&output, DOCUMENT), entry(&input, DOCUMENT));
    assert_eq!(stats.total_substitutions, 0);
}

#[test]
fn values_are_escaped_in_xml() {
    let input = Template::new().text("供应商名称：________").build();
    let values = values(&[(FieldId::CompanyName, "A&B <科技> 公司")]);
    let (_, output) = fill_ok(&input, &values, &defaults());
    let xml = entry(&output, DOCUMENT).unwrap();
    assert!(xml.contains("A&amp;B &lt;科技&gt; 公司"));
    assert_eq!(paragraphs(&xml), ["供应商名称：A&B <科技> 公司"]);
}

#[test]
fn padded_line_placeholders_leave_no_marks() {
    let input = Template::new().text("电话：  ________    传真：  ________").build();
    let values = values(&[(FieldId::Phone, "010"), (FieldId::Fax, "020")]);
    let (stats, output) = fill_ok(&input, &values, &defaults());
    assert_eq!(paragraphs(&entry(&output, DOCUMENT).unwrap()), ["电话：010    传真：020"]);
    assert_eq!(stats.total_substitutions, 2);
    assert_eq!(stats.residue_count(), 0);
}

#[test]
fn blank_space_line_placeholders_are_consumed() {
    let input = Template::new()
        .text("电话：\u{3000}\u{3000}\u{3000}\u{3000}\u{3000}\u{3000}传真：\u{3000}\u{3000}\u{3000}")
        .build();
    let values = values(&[(FieldId::Phone, "010"), (FieldId::Fax, "020")]);
    let (stats, output) = fill_ok(&input, &values, &defaults());
    assert_eq!(paragraphs(&entry(&output, DOCUMENT).unwrap()), ["电话：010    传真：020"]);
    assert_eq!(stats.total_substitutions, 2);
}

#[test]
fn repeated_bracketed_label_is_filled_everywhere() {
    let input = Template::new().text("（项目名称）的采购，（项目编号）号，（项目名称）结束").build();
    let values = values(&[(FieldId::ProjectName, "P"), (FieldId::ProjectNumber, "N")]);
    let (stats, output) = fill_ok(&input, &values, &defaults());
    assert_eq!(
        paragraphs(&entry(&output, DOCUMENT).unwrap()),
        ["（P）的采购，（N）号，（P）结束"]
    );
    assert_eq!(stats.per_field.get(&FieldId::ProjectName), Some(&2));
    assert_eq!(stats.total_substitutions, 3);
}

#[test]
fn same_priority_rule_on_the_same_span_is_reported() {
    let input = Template::new().text("传真：________").build();
    let options = FillOptions {
        extra_rules: vec![RuleSpec {
            name: "fax-underscores".into(),
            priority: 20,
            pattern: r"^(?P<label>传真)(?P<sep>：)(?P<ph>_+)$".into(),
            strategy: Strategy::FillPlaceholder,
            field: Some(FieldId::Fax),
            description: String::new(),
        }],
        ..defaults()
    };
    let (stats, output) = fill_ok(&input, &values(&[(FieldId::Fax, "010-1")]), &options);

    assert_eq!(paragraphs(&entry(&output, DOCUMENT).unwrap()), ["传真：010-1"]);
    let warnings: Vec<_> = stats.warnings_of(WarningKind::AmbiguousMatch).collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].rule.as_deref(), Some("label-colon-placeholder/fax"));
    assert!(warnings[0].message.contains("fax-underscores"));
}

#[test]
fn placeholder_across_a_field_is_left_alone() {
    let input = Template::new()
        .block(para(&[
            run("传真："),
            run("____"),
            r#"<w:r><w:fldChar w:fldCharType="begin"/></w:r>"#.to_string(),
            r#"<w:r><w:instrText xml:space="preserve"> PAGE </w:instrText></w:r>"#.to_string(),
            r#"<w:r><w:fldChar w:fldCharType="separate"/></w:r>"#.to_string(),
            run("____"),
            r#"<w:r><w:fldChar w:fldCharType="end"/></w:r>"#.to_string(),
        ]))
        .build();
    let (stats, output) = fill_ok(&input, &values(&[(FieldId::Fax, "010-1")]), &defaults());

    assert_eq!(entry(&output, DOCUMENT), entry(&input, DOCUMENT));
    let anomalies: Vec<_> = stats.warnings_of(WarningKind::FormattingAnomaly).collect();
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].field, Some(FieldId::Fax));
    assert_eq!(stats.total_substitutions, 0);
    assert_eq!(stats.paragraphs_changed, 0);
}

#[test]
fn preserve_underline_keeps_placeholder_underline() {
    let input = Template::new()
        .block(para(&[run("供应商名称："), styled(UNDERLINE, "____________")]))
        .build();
    let options = FillOptions { preserve_underline: true, ..defaults() };
    let (_, output) = fill_ok(&input, &values(&[(FieldId::CompanyName, COMPANY)]), &options);

    let runs = runs(&entry(&output, DOCUMENT).unwrap(), 0);
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[1], RunInfo { text: COMPANY.into(), italic: false, underline: true });
}

#[test]
fn configured_width_sets_dual_field_spacing() {
    let line = format!("电话{}电子邮件", " ".repeat(34));
    let input = Template::new().text(&line).build();
    let values = values(&[(FieldId::Phone, "010-63271000"), (FieldId::Email, "ops@example.com")]);
    let options = FillOptions { collapse_spacing_width: 6, ..defaults() };
    let (_, output) = fill_ok(&input, &values, &options);
    assert_eq!(
        paragraphs(&entry(&output, DOCUMENT).unwrap()),
        ["电话：010-63271000      电子邮件：ops@example.com"]
    );
}

#[test]
fn configured_width_sets_line_and_prose_spacing() {
    let options = FillOptions { collapse_spacing_width: 2, ..defaults() };

    let input = Template::new().text("电话：________        传真：________").build();
    let values_line = values(&[(FieldId::Phone, "010"), (FieldId::Fax, "020")]);
    let (_, output) = fill_ok(&input, &values_line, &options);
    assert_eq!(paragraphs(&entry(&output, DOCUMENT).unwrap()), ["电话：010  传真：020"]);

    let input = Template::new().text("邮政编码：______          （六位数字）").build();
    let (_, output) = fill_ok(&input, &values(&[(FieldId::PostalCode, "100032")]), &options);
    assert_eq!(
        paragraphs(&entry(&output, DOCUMENT).unwrap()),
        ["邮政编码：100032  （六位数字）"]
    );
}
