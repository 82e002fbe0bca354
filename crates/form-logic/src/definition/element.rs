use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Identifier of a form element, unique within its form.
pub type ElementId = i64;

/// Component type of a form element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    WelcomeMessage,
    Statement,
    SaveScreen,
    ThankYou,
    #[default]
    ShortText,
    TextArea,
    Email,
    Number,
    Rating,
    YesNo,
    MultipleChoice,
    ComboBox,
    Name,
    Consent,
    Matrix,
}

impl ElementType {
    /// Layout elements carry no answer and produce no export columns.
    pub fn is_input(self) -> bool {
        !matches!(
            self,
            ElementType::WelcomeMessage
                | ElementType::Statement
                | ElementType::SaveScreen
                | ElementType::ThankYou
        )
    }
}

/// One row of a matrix question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MatrixRow {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl MatrixRow {
    /// Key used both in the stored answer object and in the export column name.
    pub fn key(&self) -> &str {
        self.value.as_deref().unwrap_or(&self.label)
    }
}

/// Type-specific settings that influence answer shape and export columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct ComponentSettings {
    #[serde(default)]
    pub multiple_select: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<MatrixRow>,
}

/// One question or step of a form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FormElement {
    pub id: ElementId,
    pub position: i32,
    #[serde(rename = "type", default)]
    pub kind: ElementType,
    #[serde(default)]
    pub is_required: bool,
    pub export_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jump_to_id: Option<ElementId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subordinate_to: Option<ElementId>,
    #[serde(default)]
    pub settings: ComponentSettings,
}

impl FormElement {
    pub fn is_input(&self) -> bool {
        self.kind.is_input()
    }

    /// Label shown to respondents, falling back to the export id.
    pub fn label(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.export_id)
    }
}
