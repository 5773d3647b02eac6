//! Partnership letter generation.
//!
//! Template artifacts are resolved through an injected [`TemplateSource`], so the generator
//! itself stays a pure function of its inputs.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::OutreachConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    Formal,
    Informal,
}

impl TemplateKind {
    pub fn parse(raw: &str) -> Result<Self, LetterError> {
        match raw {
            "formal" => Ok(Self::Formal),
            "informal" => Ok(Self::Informal),
            other => Err(LetterError::InvalidTemplate(other.to_string())),
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Formal => "formal",
            Self::Informal => "informal",
        }
    }

    /// Name of the template artifact holding this kind's body.
    pub fn artifact_name(self) -> String {
        format!("{}_letter.txt", self.label())
    }

    fn subject(self, company_name: &str, org_name: &str) -> String {
        match self {
            Self::Formal => format!("Partnership proposal for {company_name} from {org_name}"),
            Self::Informal => {
                format!("{company_name} x {org_name}: let's build something together")
            }
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LetterError {
    #[error("unsupported letter template '{0}': expected 'formal' or 'informal'")]
    InvalidTemplate(String),
    #[error("letter template artifact '{0}' could not be resolved")]
    TemplateNotFound(String),
    #[error("failed to read letter template '{name}': {source}")]
    TemplateIo {
        name: String,
        source: std::io::Error,
    },
}

/// A resolved template artifact ready for substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LetterTemplate {
    name: String,
    source: String,
}

impl LetterTemplate {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Substitute `{{ key }}` placeholders. Unknown keys are left untouched.
    pub fn render(&self, values: &HashMap<&str, String>) -> String {
        let mut output = String::with_capacity(self.source.len());
        let mut rest = self.source.as_str();

        while let Some(start) = rest.find("{{") {
            output.push_str(&rest[..start]);
            let after_open = &rest[start + 2..];
            let Some(end) = after_open.find("}}") else {
                output.push_str(&rest[start..]);
                return output;
            };

            let key = after_open[..end].trim();
            match values.get(key) {
                Some(value) => output.push_str(value),
                None => output.push_str(&rest[start..start + 2 + end + 2]),
            }
            rest = &after_open[end + 2..];
        }

        output.push_str(rest);
        output
    }
}

/// Resolves template artifacts by name, e.g. `formal_letter.txt`.
pub trait TemplateSource: Send + Sync {
    fn resolve(&self, name: &str) -> Result<Option<LetterTemplate>, LetterError>;
}

const FORMAL_LETTER: &str = "\
Dear {{ company_name }} team,

{{ org_name }} follows the growth of {{ company_name }} closely. Your open positions show a \
strong demand for specialists in {{ skills }}, and our programmes prepare exactly these \
profiles.

We would like to propose a partnership: joint internships, project-based courses built around \
your stack, and early access to our graduates.

If this is of interest, please reply to {{ contact_email }} and we will arrange a meeting at a \
time convenient for you.

Kind regards,
{{ org_name }}
";

const INFORMAL_LETTER: &str = "\
Hi {{ company_name }} team!

We noticed you're hiring people who know {{ skills }}. That's exactly what our students at \
{{ org_name }} are learning right now.

How about teaming up? Internships, hackathons, guest talks: we're open to whatever works for \
you.

Drop us a line at {{ contact_email }} and let's chat.

Cheers,
{{ org_name }}
";

/// In-memory template fixtures; ships the default formal and informal bodies.
#[derive(Debug, Clone, Default)]
pub struct BuiltinTemplates {
    templates: HashMap<String, String>,
}

impl BuiltinTemplates {
    pub fn standard() -> Self {
        Self::default()
            .with(TemplateKind::Formal.artifact_name(), FORMAL_LETTER)
            .with(TemplateKind::Informal.artifact_name(), INFORMAL_LETTER)
    }

    pub fn with(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.templates.insert(name.into(), source.into());
        self
    }
}

impl TemplateSource for BuiltinTemplates {
    fn resolve(&self, name: &str) -> Result<Option<LetterTemplate>, LetterError> {
        Ok(self
            .templates
            .get(name)
            .map(|source| LetterTemplate::new(name, source.clone())))
    }
}

/// Reads template artifacts from a directory on every resolution.
#[derive(Debug, Clone)]
pub struct DirectoryTemplates {
    root: PathBuf,
}

impl DirectoryTemplates {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl TemplateSource for DirectoryTemplates {
    fn resolve(&self, name: &str) -> Result<Option<LetterTemplate>, LetterError> {
        match std::fs::read_to_string(self.root.join(name)) {
            Ok(source) => Ok(Some(LetterTemplate::new(name, source))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(LetterError::TemplateIo {
                name: name.to_string(),
                source,
            }),
        }
    }
}

/// Inputs substituted into a letter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LetterRequest {
    pub company_name: String,
    pub skills: Vec<String>,
    pub contact_email: String,
    pub org_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedLetter {
    pub subject: String,
    pub body: String,
    pub template: TemplateKind,
}

const FALLBACK_SKILLS: &str = "modern software development";

#[derive(Clone)]
pub struct LetterGenerator {
    templates: Arc<dyn TemplateSource>,
}

impl fmt::Debug for LetterGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LetterGenerator").finish_non_exhaustive()
    }
}

impl LetterGenerator {
    pub fn new(templates: Arc<dyn TemplateSource>) -> Self {
        Self { templates }
    }

    pub fn builtin() -> Self {
        Self::new(Arc::new(BuiltinTemplates::standard()))
    }

    pub fn from_config(config: &OutreachConfig) -> Self {
        match &config.templates_dir {
            Some(dir) => Self::new(Arc::new(DirectoryTemplates::new(dir))),
            None => Self::builtin(),
        }
    }

    /// Validate the raw template selector, then render.
    pub fn generate(
        &self,
        template: &str,
        request: &LetterRequest,
    ) -> Result<GeneratedLetter, LetterError> {
        let kind = TemplateKind::parse(template)?;
        self.render(kind, request)
    }

    pub fn render(
        &self,
        kind: TemplateKind,
        request: &LetterRequest,
    ) -> Result<GeneratedLetter, LetterError> {
        let artifact = kind.artifact_name();
        let template = self
            .templates
            .resolve(&artifact)?
            .ok_or(LetterError::TemplateNotFound(artifact))?;
        debug!(template = template.name(), company = %request.company_name, "rendering letter");

        let skills = if request.skills.is_empty() {
            FALLBACK_SKILLS.to_string()
        } else {
            request.skills.join(", ")
        };

        let mut values = HashMap::new();
        values.insert("company_name", request.company_name.clone());
        values.insert("skills", skills);
        values.insert("contact_email", request.contact_email.clone());
        values.insert("org_name", request.org_name.clone());

        Ok(GeneratedLetter {
            subject: kind.subject(&request.company_name, &request.org_name),
            body: template.render(&values),
            template: kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> LetterRequest {
        LetterRequest {
            company_name: "Kontur".to_string(),
            skills: vec![
                "Python".to_string(),
                "Django".to_string(),
                "PostgreSQL".to_string(),
            ],
            contact_email: "partners@uni.example".to_string(),
            org_name: "Ural Federal University".to_string(),
        }
    }

    #[test]
    fn formal_letter_substitutes_every_field() {
        let letter = LetterGenerator::builtin()
            .generate("formal", &request())
            .expect("formal renders");

        assert_eq!(letter.template, TemplateKind::Formal);
        assert_eq!(
            letter.subject,
            "Partnership proposal for Kontur from Ural Federal University"
        );
        assert!(letter.body.starts_with("Dear Kontur team,"));
        assert!(letter.body.contains("Python, Django, PostgreSQL"));
        assert!(letter.body.contains("partners@uni.example"));
        assert!(!letter.body.contains("{{"));
    }

    #[test]
    fn informal_subject_differs_from_formal() {
        let generator = LetterGenerator::builtin();
        let formal = generator.generate("formal", &request()).expect("formal");
        let informal = generator.generate("informal", &request()).expect("informal");
        assert_ne!(formal.subject, informal.subject);
        assert!(informal.subject.contains("Kontur"));
        assert!(informal.body.starts_with("Hi Kontur team!"));
    }

    #[test]
    fn unknown_template_is_invalid_argument() {
        match LetterGenerator::builtin().generate("bogus", &request()) {
            Err(LetterError::InvalidTemplate(value)) => assert_eq!(value, "bogus"),
            other => panic!("expected invalid template, got {other:?}"),
        }
        assert!(matches!(
            TemplateKind::parse("Formal"),
            Err(LetterError::InvalidTemplate(_))
        ));
    }

    #[test]
    fn missing_artifact_is_not_found() {
        let generator = LetterGenerator::new(Arc::new(
            BuiltinTemplates::default().with("formal_letter.txt", "Hi {{company_name}}"),
        ));

        match generator.generate("informal", &request()) {
            Err(LetterError::TemplateNotFound(name)) => assert_eq!(name, "informal_letter.txt"),
            other => panic!("expected missing template, got {other:?}"),
        }

        let formal = generator.generate("formal", &request()).expect("renders");
        assert_eq!(formal.body, "Hi Kontur");
    }

    #[test]
    fn generation_is_deterministic() {
        let generator = LetterGenerator::builtin();
        let first = generator.generate("informal", &request()).expect("renders");
        let second = generator.generate("informal", &request()).expect("renders");
        assert_eq!(first, second);
    }

    #[test]
    fn empty_skills_use_fallback_phrase() {
        let mut request = request();
        request.skills.clear();
        let letter = LetterGenerator::builtin()
            .generate("formal", &request)
            .expect("renders");
        assert!(letter.body.contains(FALLBACK_SKILLS));
    }

    #[test]
    fn render_leaves_unknown_and_unterminated_placeholders() {
        let template = LetterTemplate::new("t", "{{ known }} {{ unknown }} {{ open");
        let mut values = HashMap::new();
        values.insert("known", "yes".to_string());
        assert_eq!(template.render(&values), "yes {{ unknown }} {{ open");
    }

    #[test]
    fn directory_templates_read_artifacts_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("formal_letter.txt"),
            "To {{ company_name }} from {{ org_name }}",
        )
        .expect("write template");

        let source = DirectoryTemplates::new(dir.path());
        let resolved = source
            .resolve("formal_letter.txt")
            .expect("readable")
            .expect("present");
        assert_eq!(resolved.name(), "formal_letter.txt");

        let generator = LetterGenerator::new(Arc::new(source));
        let letter = generator.generate("formal", &request()).expect("renders");
        assert_eq!(letter.body, "To Kontur from Ural Federal University");

        assert!(matches!(
            generator.generate("informal", &request()),
            Err(LetterError::TemplateNotFound(_))
        ));
    }
}
