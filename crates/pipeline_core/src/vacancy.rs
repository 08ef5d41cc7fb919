use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PipelineError;

/// How a `Vacancy` entered the system (spec.md GLOSSARY / §3), grounded in
/// the original's `SourceType` enum (`tg`/`manual`, renamed here to the two
/// names spec.md itself uses: "manual, external").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VacancySource {
	Manual,
	External,
}

impl VacancySource {
	#[must_use]
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Manual => "manual",
			Self::External => "external",
		}
	}
}

impl std::str::FromStr for VacancySource {
	type Err = PipelineError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"manual" => Ok(Self::Manual),
			"external" => Ok(Self::External),
			other => Err(PipelineError::validation(format!("unknown vacancy source: {other}"))),
		}
	}
}

/// Specialist kind shared by `Vacancy` and `Resume`, grounded in the
/// original's `SpecialistType` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialistType {
	Frontend,
	Backend,
	Fullstack,
	Analyst,
	Devops,
	Qa,
	AutomaticQa,
	Designer,
	Other,
}

impl SpecialistType {
	#[must_use]
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Frontend => "frontend",
			Self::Backend => "backend",
			Self::Fullstack => "fullstack",
			Self::Analyst => "analyst",
			Self::Devops => "devops",
			Self::Qa => "qa",
			Self::AutomaticQa => "automatic_qa",
			Self::Designer => "designer",
			Self::Other => "other",
		}
	}
}

impl std::str::FromStr for SpecialistType {
	type Err = PipelineError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"frontend" => Ok(Self::Frontend),
			"backend" => Ok(Self::Backend),
			"fullstack" => Ok(Self::Fullstack),
			"analyst" => Ok(Self::Analyst),
			"devops" => Ok(Self::Devops),
			"qa" => Ok(Self::Qa),
			"automatic_qa" => Ok(Self::AutomaticQa),
			"designer" => Ok(Self::Designer),
			"other" => Ok(Self::Other),
			other => Err(PipelineError::validation(format!("unknown specialist type: {other}"))),
		}
	}
}

/// Work arrangement offered by a `Vacancy`, grounded in `WorkFormat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkFormat {
	Office,
	Remote,
	Hybrid,
}

impl WorkFormat {
	#[must_use]
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Office => "office",
			Self::Remote => "remote",
			Self::Hybrid => "hybrid",
		}
	}
}

impl std::str::FromStr for WorkFormat {
	type Err = PipelineError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"office" => Ok(Self::Office),
			"remote" => Ok(Self::Remote),
			"hybrid" => Ok(Self::Hybrid),
			other => Err(PipelineError::validation(format!("unknown work format: {other}"))),
		}
	}
}

/// Seniority level shared by `Vacancy` and `Resume`, grounded in `Grade`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
	Junior,
	Middle,
	Senior,
	Principle,
	Lead,
}

impl Grade {
	#[must_use]
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Junior => "junior",
			Self::Middle => "middle",
			Self::Senior => "senior",
			Self::Principle => "principle",
			Self::Lead => "lead",
		}
	}
}

impl std::str::FromStr for Grade {
	type Err = PipelineError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"junior" => Ok(Self::Junior),
			"middle" => Ok(Self::Middle),
			"senior" => Ok(Self::Senior),
			"principle" => Ok(Self::Principle),
			"lead" => Ok(Self::Lead),
			other => Err(PipelineError::validation(format!("unknown grade: {other}"))),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Salary {
	pub salary_from: Option<i64>,
	pub salary_to: Option<i64>,
	pub currency: String,
	pub tax_included: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Technology {
	pub name: String,
	pub level: u8,
	pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
	pub name: String,
	pub level: u8,
	pub required: bool,
}

/// A job vacancy text plus its structured attributes (spec.md §3
/// "Vacancy").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vacancy {
	pub id: Uuid,
	pub source: VacancySource,
	pub text: String,
	pub company: Option<String>,
	pub job_title: Option<String>,
	pub specialist_type: SpecialistType,
	pub work_format: WorkFormat,
	pub grade: Grade,
	pub experience_required: i32,
	pub salary: Option<Salary>,
	pub technologies: Vec<Technology>,
	pub skills: Vec<Skill>,
	pub duplicate_checked_at: Option<DateTime<Utc>>,
	pub duplicate_check_success: Option<bool>,
	pub original_vacancy_id: Option<Uuid>,
	pub processed_at: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
}

impl Vacancy {
	/// spec.md §3 invariant: "a vacancy with non-null `original_vacancy_id`
	/// is never itself the target of further matching".
	#[must_use]
	pub const fn is_duplicate(&self) -> bool {
		self.original_vacancy_id.is_some()
	}
}

/// A candidate resume (spec.md §3 "Resume").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resume {
	pub id: Uuid,
	pub employee: Option<String>,
	pub text: String,
	pub specialist_type: SpecialistType,
	pub grade: Grade,
	pub is_active: bool,
	pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchComment {
	pub text: String,
	pub score: u8,
}

/// A (vacancy, resume) compatibility record (spec.md §3 "Match").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VacancyResumeMatch {
	pub id: Uuid,
	pub vacancy_id: Uuid,
	pub resume_id: Uuid,
	pub score: u8,
	pub is_recommended: bool,
	pub comments: Vec<MatchComment>,
	pub created_at: DateTime<Utc>,
}
