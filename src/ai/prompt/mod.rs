//! Prompt Builder System
//!
//! Assembles category and material classification prompts from the record
//! context, the option list and the configured behavior bundle (reasoning
//! style, language, strictness).
//!
//! ## Layout
//!
//! 1. **Role**: classifier persona
//! 2. **Task**: numbered instructions for the step kind
//! 3. **Reasoning / Strictness**: optional behavior blocks
//! 4. **Inputs**: record context and options as JSON code blocks
//! 5. **Output**: expected JSON keys, optional worked example

use serde_json::{Map, Value, json};

use crate::ai::classifier::{ClassificationKind, ClassificationRequest, RecordKind};
use crate::config::{PromptLanguage, PromptSettings, ReasoningStyle, Strictness};
use crate::constants::traversal::{CATEGORY_KEY, MATERIALS_KEY};
use crate::types::utils::is_placeholder;

/// Prompt section types
#[derive(Debug, Clone)]
pub enum PromptSection {
    Role(String),
    Objectives(Vec<String>),
    Text {
        header: Option<String>,
        content: String,
    },
    Code {
        language: String,
        content: String,
    },
}

/// Ordered prompt sections rendered as markdown
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    sections: Vec<PromptSection>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn role(mut self, role: &str) -> Self {
        self.sections.push(PromptSection::Role(role.to_string()));
        self
    }

    pub fn objectives<S: AsRef<str>>(mut self, objectives: &[S]) -> Self {
        self.sections.push(PromptSection::Objectives(
            objectives.iter().map(|o| o.as_ref().to_string()).collect(),
        ));
        self
    }

    pub fn section(mut self, header: &str, content: &str) -> Self {
        self.sections.push(PromptSection::Text {
            header: Some(header.to_string()),
            content: content.to_string(),
        });
        self
    }

    pub fn text(mut self, content: &str) -> Self {
        self.sections.push(PromptSection::Text {
            header: None,
            content: content.to_string(),
        });
        self
    }

    pub fn code(mut self, language: &str, content: &str) -> Self {
        self.sections.push(PromptSection::Code {
            language: language.to_string(),
            content: content.to_string(),
        });
        self
    }

    pub fn build(self) -> String {
        let mut prompt = String::new();

        for section in self.sections {
            match section {
                PromptSection::Role(role) => {
                    prompt.push_str(&role);
                    prompt.push_str("\n\n");
                }
                PromptSection::Objectives(objectives) => {
                    for (i, obj) in objectives.iter().enumerate() {
                        prompt.push_str(&format!("{}. {}\n", i + 1, obj));
                    }
                    prompt.push('\n');
                }
                PromptSection::Text { header, content } => {
                    if let Some(h) = header {
                        prompt.push_str(&format!("**{}**\n\n", h));
                    }
                    prompt.push_str(&content);
                    prompt.push_str("\n\n");
                }
                PromptSection::Code { language, content } => {
                    prompt.push_str(&format!("```{}\n", language));
                    prompt.push_str(&content);
                    prompt.push_str("\n```\n\n");
                }
            }
        }

        prompt.trim_end().to_string()
    }
}

// =============================================================================
// Phrase tables
// =============================================================================

struct Phrases {
    category_role: &'static str,
    material_role: &'static str,
    element: &'static str,
    target_layer: &'static str,
    input_record: &'static str,
    input_categories: &'static str,
    input_materials: &'static str,
    output: &'static str,
    example: &'static str,
    category_task: [&'static str; 4],
    material_task: [&'static str; 3],
}

const EN: Phrases = Phrases {
    category_role: "You are an expert in classifying BIM elements to life cycle assessment (LCA) categories.",
    material_role: "You are an expert in matching BIM elements to materials of a life cycle assessment (LCA) database.",
    element: "an IfcBuildingElement",
    target_layer: "a Target Layer of an IfcBuildingElement",
    input_record: "Input 1 (data describing the record)",
    input_categories: "Input 2 (categories of an LCA database)",
    input_materials: "Input 2 (materials of an LCA database)",
    output: "Output format",
    example: "Example",
    category_task: [
        "Identify the single most accurate category for the record in Input 1.",
        "If a material name is available, base the decision on the material name first.",
        "Choose a category in which you expect viable material entries for the record.",
        "If the record cannot be clearly classified, answer with an empty list.",
    ],
    material_task: [
        "Select the materials from Input 2 that describe the record in Input 1.",
        "If no material name is available, use all other contextual clues (name, type, property sets).",
        "Only answer with names exactly as they appear in Input 2.",
    ],
};

const DE: Phrases = Phrases {
    category_role: "Du bist ein Experte darin, BIM-Elemente in Kategorien einer Lebenszyklusanalyse (LCA) Datenbank einzuordnen.",
    material_role: "Du bist ein Experte darin, BIM-Elementen Materialien einer Lebenszyklusanalyse (LCA) Datenbank zuzuordnen.",
    element: "ein IfcBuildingElement",
    target_layer: "ein Target Layer von einem IfcBuildingElement",
    input_record: "Eingabe 1 (Daten, welche den Datensatz beschreiben)",
    input_categories: "Eingabe 2 (Kategorien einer LCA Datenbank)",
    input_materials: "Eingabe 2 (Materialien einer LCA Datenbank)",
    output: "Ausgabeformat",
    example: "Beispiel",
    category_task: [
        "Identifiziere die genaueste Kategorie für den Datensatz aus Eingabe 1.",
        "Wenn ein Materialname verfügbar ist, priorisiere die Zuordnung anhand des Materialnamens.",
        "Wähle eine Kategorie, in der du passende Materialeinträge erwartest.",
        "Wenn keine eindeutige Zuordnung möglich ist, antworte mit einer leeren Liste.",
    ],
    material_task: [
        "Wähle die Materialien aus Eingabe 2, die den Datensatz aus Eingabe 1 beschreiben.",
        "Ohne Materialnamen nutze alle anderen Kontextinformationen (Name, Typ, Psets).",
        "Antworte nur mit Namen, wie sie in Eingabe 2 stehen.",
    ],
};

fn phrases(language: PromptLanguage) -> &'static Phrases {
    match language {
        PromptLanguage::En => &EN,
        PromptLanguage::De => &DE,
    }
}

fn strictness_line(strictness: Strictness, language: PromptLanguage) -> &'static str {
    match (language, strictness) {
        (PromptLanguage::En, Strictness::Low) => {
            "Select every material that could plausibly describe the record, including close substitutes."
        }
        (PromptLanguage::En, Strictness::Mid) => {
            "Select materials that match the described material; accept close variants only if no exact entry exists."
        }
        (PromptLanguage::En, Strictness::High) => {
            "Select only materials that match the described material exactly. If none does, answer with an empty list."
        }
        (PromptLanguage::De, Strictness::Low) => {
            "Wähle alle Materialien, die den Datensatz plausibel beschreiben, auch nahe Alternativen."
        }
        (PromptLanguage::De, Strictness::Mid) => {
            "Wähle passende Materialien; nahe Varianten nur, wenn kein exakter Eintrag existiert."
        }
        (PromptLanguage::De, Strictness::High) => {
            "Wähle nur exakt passende Materialien. Gibt es keine, antworte mit einer leeren Liste."
        }
    }
}

fn reasoning_line(style: ReasoningStyle, language: PromptLanguage) -> Option<&'static str> {
    let line = match (language, style) {
        (_, ReasoningStyle::Plain) => return None,
        (PromptLanguage::En, ReasoningStyle::ChainOfThought) => {
            "Think step by step and write your reasoning into the \"Reasoning\" field before answering."
        }
        (PromptLanguage::En, ReasoningStyle::ExtractThenReason) => {
            "First extract the material-relevant facts of the record into \"Extracted Information\", then decide based only on them."
        }
        (PromptLanguage::En, ReasoningStyle::SelfRefine) => {
            "Give a first answer in \"Initial Answer\", critique it, then write the improved final answer."
        }
        (PromptLanguage::De, ReasoningStyle::ChainOfThought) => {
            "Denke Schritt für Schritt und schreibe deine Begründung vor der Antwort in das Feld \"Reasoning\"."
        }
        (PromptLanguage::De, ReasoningStyle::ExtractThenReason) => {
            "Extrahiere zuerst die materialrelevanten Fakten in \"Extracted Information\" und entscheide nur auf dieser Basis."
        }
        (PromptLanguage::De, ReasoningStyle::SelfRefine) => {
            "Gib eine erste Antwort in \"Initial Answer\", prüfe sie kritisch und schreibe dann die verbesserte Endantwort."
        }
    };
    Some(line)
}

// =============================================================================
// Classification prompts
// =============================================================================

/// Render the prompt for one classification step.
///
/// `context` is the (possibly pruned) record context; the request's own
/// context is not read here.
pub fn build_classification_prompt(
    request: &ClassificationRequest,
    context: &Value,
    settings: &PromptSettings,
) -> String {
    let p = phrases(settings.language);
    let subject = match request.record_kind {
        RecordKind::Element => p.element,
        RecordKind::TargetLayer => p.target_layer,
    };

    let mut builder = PromptBuilder::new();
    let (options_header, answer_key) = match request.kind {
        ClassificationKind::Category => {
            builder = builder.role(p.category_role).objectives(&p.category_task);
            (p.input_categories, CATEGORY_KEY)
        }
        ClassificationKind::Material => {
            builder = builder
                .role(p.material_role)
                .objectives(&p.material_task)
                .text(strictness_line(settings.strictness, settings.language));
            if let Some(category) = &request.last_category {
                builder = builder.text(&format!("Category: {}", category));
            }
            (p.input_materials, MATERIALS_KEY)
        }
    };

    if let Some(line) = reasoning_line(settings.reasoning, settings.language) {
        builder = builder.text(line);
    }

    builder = builder
        .section(&format!("{} ({})", p.input_record, subject), "")
        .code("json", &pretty(context))
        .section(options_header, "")
        .code("json", &pretty(&Value::Array(request.options.clone())))
        .section(p.output, &format!("Answer with a JSON object with the key \"{}\".", answer_key));

    if settings.include_examples {
        builder = builder
            .section(p.example, "")
            .code("json", &pretty(&example_answer(request.kind)));
    }

    builder.build()
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn example_answer(kind: ClassificationKind) -> Value {
    match kind {
        ClassificationKind::Category => json!({ CATEGORY_KEY: "Mauerwerk" }),
        ClassificationKind::Material => json!({
            MATERIALS_KEY: ["Anstrich, lösemittelverdünnbar, 2 Anstriche", "Anstrich, wasserverdünnbar, 2 Anstriche"]
        }),
    }
}

/// JSON schema of the expected reply for a step kind and reasoning style
pub fn response_schema(kind: ClassificationKind, reasoning: ReasoningStyle) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    match reasoning {
        ReasoningStyle::Plain => {}
        ReasoningStyle::ChainOfThought => {
            properties.insert("Reasoning".into(), json!({"type": "string"}));
        }
        ReasoningStyle::ExtractThenReason => {
            properties.insert("Extracted Information".into(), json!({"type": "object"}));
        }
        ReasoningStyle::SelfRefine => {
            properties.insert("Initial Answer".into(), json!({}));
        }
    }

    match kind {
        ClassificationKind::Category => {
            properties.insert(
                CATEGORY_KEY.into(),
                json!({"type": ["string", "null", "array"]}),
            );
            required.push(CATEGORY_KEY);
        }
        ClassificationKind::Material => {
            properties.insert(
                MATERIALS_KEY.into(),
                json!({"type": "array", "items": {"type": "string"}}),
            );
            required.push(MATERIALS_KEY);
        }
    }

    json!({
        "type": "object",
        "properties": Value::Object(properties),
        "required": required,
    })
}

/// Drop null, placeholder and empty values so the context carries signal only.
pub fn prune_context(value: &Value) -> Value {
    fn prune(value: &Value) -> Option<Value> {
        match value {
            Value::Null => None,
            Value::String(s) if is_placeholder(s) => None,
            Value::Array(items) => {
                let kept: Vec<Value> = items.iter().filter_map(prune).collect();
                (!kept.is_empty()).then_some(Value::Array(kept))
            }
            Value::Object(map) => {
                let kept: Map<String, Value> = map
                    .iter()
                    .filter_map(|(k, v)| prune(v).map(|v| (k.clone(), v)))
                    .collect();
                (!kept.is_empty()).then_some(Value::Object(kept))
            }
            other => Some(other.clone()),
        }
    }
    prune(value).unwrap_or_else(|| Value::Object(Map::new()))
}
