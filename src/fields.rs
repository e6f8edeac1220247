//! Logical fields, their label aliases and where their values come from.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;
use crate::options::OnMissing;

/// A company or project record: a flat JSON object.
pub type Record = serde_json::Map<String, Value>;

pub fn load_record(path: &Path) -> Result<Record, Error> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        Error::Io(std::io::Error::new(e.kind(), format!("{}: {}", e, path.display())))
    })?;
    match serde_json::from_str::<Value>(&raw)? {
        Value::Object(map) => Ok(map),
        _ => Err(Error::InvalidOptions(format!(
            "{} must contain a JSON object",
            path.display()
        ))),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldId {
    CompanyName,
    Address,
    Phone,
    Fax,
    Email,
    PostalCode,
    LegalRepresentative,
    EstablishDate,
    ProjectName,
    ProjectNumber,
    Date,
    PurchaserName,
    CreditCode,
    RegisteredCapital,
    ContactPerson,
    BankName,
    BankAccount,
}

impl FieldId {
    pub const ALL: [FieldId; 17] = [
        FieldId::CompanyName,
        FieldId::Address,
        FieldId::Phone,
        FieldId::Fax,
        FieldId::Email,
        FieldId::PostalCode,
        FieldId::LegalRepresentative,
        FieldId::EstablishDate,
        FieldId::ProjectName,
        FieldId::ProjectNumber,
        FieldId::Date,
        FieldId::PurchaserName,
        FieldId::CreditCode,
        FieldId::RegisteredCapital,
        FieldId::ContactPerson,
        FieldId::BankName,
        FieldId::BankAccount,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FieldId::CompanyName => "company_name",
            FieldId::Address => "address",
            FieldId::Phone => "phone",
            FieldId::Fax => "fax",
            FieldId::Email => "email",
            FieldId::PostalCode => "postal_code",
            FieldId::LegalRepresentative => "legal_representative",
            FieldId::EstablishDate => "establish_date",
            FieldId::ProjectName => "project_name",
            FieldId::ProjectNumber => "project_number",
            FieldId::Date => "date",
            FieldId::PurchaserName => "purchaser_name",
            FieldId::CreditCode => "credit_code",
            FieldId::RegisteredCapital => "registered_capital",
            FieldId::ContactPerson => "contact_person",
            FieldId::BankName => "bank_name",
            FieldId::BankAccount => "bank_account",
        }
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldId::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| format!("unknown field `{s}`"))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueFormat {
    Plain,
    ChineseDate,
}

#[derive(Clone, Debug)]
pub struct FieldDef {
    pub id: FieldId,
    pub aliases: Vec<String>,
    pub sources: Vec<&'static str>,
    /// Overrides `FillOptions::on_missing` for this field.
    pub on_missing: Option<OnMissing>,
    pub format: ValueFormat,
}

fn def(
    id: FieldId,
    aliases: &[&str],
    sources: &[&'static str],
    on_missing: Option<OnMissing>,
    format: ValueFormat,
) -> FieldDef {
    FieldDef {
        id,
        aliases: aliases.iter().map(|a| a.to_string()).collect(),
        sources: sources.to_vec(),
        on_missing,
        format,
    }
}

#[derive(Clone, Debug)]
pub struct Registry {
    fields: Vec<FieldDef>,
}

impl Registry {
    pub fn standard() -> Registry {
        use FieldId::*;
        use ValueFormat::*;
        let fields = vec![
            def(
                CompanyName,
                &[
                    "供应商名称", "供应商全称", "投标人名称", "公司名称", "单位名称",
                    "应答人名称", "投标单位", "乙方名称", "供应商", "投标人",
                ],
                &["company_name", "name", "supplier_name"],
                None,
                Plain,
            ),
            def(
                Address,
                &["注册地址", "办公地址", "通讯地址", "联系地址", "公司地址", "地址"],
                &["address", "registered_address", "office_address"],
                None,
                Plain,
            ),
            def(
                Phone,
                &["联系电话", "固定电话", "电话号码", "电话"],
                &["fixed_phone", "phone"],
                None,
                Plain,
            ),
            def(Fax, &["传真号码", "传真"], &["fax"], None, Plain),
            def(
                Email,
                &["电子邮箱", "电子邮件", "邮箱", "E-mail", "Email"],
                &["email"],
                None,
                Plain,
            ),
            def(PostalCode, &["邮政编码", "邮编"], &["postal_code", "postcode"], None, Plain),
            def(
                LegalRepresentative,
                &["法定代表人姓名", "法定代表人", "法人代表"],
                &["legal_representative", "legal_person"],
                None,
                Plain,
            ),
            def(
                EstablishDate,
                &["成立时间", "成立日期", "注册日期"],
                &["establish_date", "establishment_date"],
                None,
                ChineseDate,
            ),
            def(
                ProjectName,
                &["采购项目名称", "招标项目名称", "项目名称"],
                &["project_name"],
                None,
                Plain,
            ),
            def(
                ProjectNumber,
                &["项目编号", "采购编号", "招标编号", "磋商编号"],
                &["project_number", "tender_no"],
                None,
                Plain,
            ),
            def(
                Date,
                &["投标日期", "响应日期", "日期"],
                &["date", "bid_date"],
                Some(OnMissing::Skip),
                ChineseDate,
            ),
            def(
                PurchaserName,
                &["采购人名称", "招标人名称", "采购单位", "采购人", "招标人"],
                &["purchaser_name", "purchaser", "tenderee"],
                None,
                Plain,
            ),
            def(
                CreditCode,
                &["统一社会信用代码", "社会信用代码"],
                &["credit_code", "unified_social_credit_code"],
                None,
                Plain,
            ),
            def(RegisteredCapital, &["注册资本"], &["registered_capital"], None, Plain),
            def(ContactPerson, &["联系人"], &["contact_person", "contact"], None, Plain),
            def(BankName, &["开户银行", "开户行"], &["bank_name"], None, Plain),
            def(BankAccount, &["银行账号", "开户账号", "账号"], &["bank_account"], None, Plain),
        ];
        Registry { fields }
    }

    /// Append caller-supplied aliases to the built-in lists.
    pub fn with_extra_aliases(mut self, extra: &BTreeMap<FieldId, Vec<String>>) -> Registry {
        for (id, aliases) in extra {
            if let Some(field) = self.fields.iter_mut().find(|f| f.id == *id) {
                for alias in aliases.iter().map(|a| a.trim()).filter(|a| !a.is_empty()) {
                    if !field.aliases.iter().any(|a| a == alias) {
                        field.aliases.push(alias.to_string());
                    }
                }
            }
        }
        self
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn get(&self, id: FieldId) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// The field a label belongs to. Exact alias match, registry order.
    pub fn field_for_label(&self, label: &str) -> Option<FieldId> {
        let label = label.trim();
        self.fields
            .iter()
            .find(|f| f.aliases.iter().any(|a| a == label))
            .map(|f| f.id)
    }

    /// Every alias of every field, longest first so regex alternation
    /// prefers "供应商名称" over "供应商".
    pub fn all_aliases(&self) -> Vec<&str> {
        let mut aliases: Vec<&str> = self
            .fields
            .iter()
            .flat_map(|f| f.aliases.iter().map(String::as_str))
            .collect();
        sort_longest_first(&mut aliases);
        aliases.dedup();
        aliases
    }

    /// First non-blank value along the field's source chain, company record
    /// first, then project record, formatted for the field.
    pub fn resolve(&self, id: FieldId, company: &Record, project: &Record) -> Option<String> {
        let field = self.get(id)?;
        let raw = field
            .sources
            .iter()
            .find_map(|key| scalar(company.get(*key)).or_else(|| scalar(project.get(*key))))?;
        Some(match field.format {
            ValueFormat::Plain => raw,
            ValueFormat::ChineseDate => format_chinese_date(&raw),
        })
    }
}

pub(crate) fn sort_longest_first(aliases: &mut Vec<&str>) {
    aliases.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));
}

fn scalar(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// `2025-03-07` → `2025年3月7日`. Also accepts `/` and `.` separators and
/// ISO datetimes; anything else is returned unchanged.
pub fn format_chinese_date(raw: &str) -> String {
    let raw = raw.trim();
    let date = ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        });
    match date {
        Some(d) => d.format("%Y年%-m月%-d日").to_string(),
        None => raw.to_string(),
    }
}

/// Resolved values for one document, keyed by field.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueMap {
    values: BTreeMap<FieldId, String>,
}

impl ValueMap {
    pub fn new() -> ValueMap {
        ValueMap::default()
    }

    pub fn from_records(registry: &Registry, company: &Record, project: &Record) -> ValueMap {
        let values = registry
            .fields()
            .iter()
            .filter_map(|f| registry.resolve(f.id, company, project).map(|v| (f.id, v)))
            .collect();
        ValueMap { values }
    }

    pub fn insert(&mut self, field: FieldId, value: impl Into<String>) -> &mut Self {
        self.values.insert(field, value.into());
        self
    }

    /// The value for `field`, if present and not blank.
    pub fn get(&self, field: FieldId) -> Option<&str> {
        self.values
            .get(&field)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(FieldId, S)> for ValueMap {
    fn from_iter<I: IntoIterator<Item = (FieldId, S)>>(iter: I) -> Self {
        ValueMap {
            values: iter.into_iter().map(|(k, v)| (k, v.into())).collect(),
        }
    }
}
