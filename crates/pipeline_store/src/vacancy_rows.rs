use std::str::FromStr;

use chrono::{DateTime, Utc};
use pipeline_core::{Grade, MatchComment, PipelineError, Resume, Salary, Skill, SpecialistType, Technology, Vacancy, VacancyResumeMatch, VacancySource, WorkFormat};
use uuid::Uuid;

#[derive(sqlx::FromRow)]
pub struct VacancyRow {
	pub id: Uuid,
	pub source: String,
	pub text: String,
	pub company: Option<String>,
	pub job_title: Option<String>,
	pub specialist_type: String,
	pub work_format: String,
	pub grade: String,
	pub experience_required: i32,
	pub salary: Option<serde_json::Value>,
	pub technologies: serde_json::Value,
	pub skills: serde_json::Value,
	pub duplicate_checked_at: Option<DateTime<Utc>>,
	pub duplicate_check_success: Option<bool>,
	pub original_vacancy_id: Option<Uuid>,
	pub processed_at: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
}

impl TryFrom<VacancyRow> for Vacancy {
	type Error = PipelineError;

	fn try_from(row: VacancyRow) -> Result<Self, Self::Error> {
		Ok(Self {
			id: row.id,
			source: VacancySource::from_str(&row.source)?,
			text: row.text,
			company: row.company,
			job_title: row.job_title,
			specialist_type: SpecialistType::from_str(&row.specialist_type)?,
			work_format: WorkFormat::from_str(&row.work_format)?,
			grade: Grade::from_str(&row.grade)?,
			experience_required: row.experience_required,
			salary: row.salary.map(serde_json::from_value::<Salary>).transpose()?,
			technologies: serde_json::from_value::<Vec<Technology>>(row.technologies)?,
			skills: serde_json::from_value::<Vec<Skill>>(row.skills)?,
			duplicate_checked_at: row.duplicate_checked_at,
			duplicate_check_success: row.duplicate_check_success,
			original_vacancy_id: row.original_vacancy_id,
			processed_at: row.processed_at,
			created_at: row.created_at,
		})
	}
}

#[derive(sqlx::FromRow)]
pub struct ResumeRow {
	pub id: Uuid,
	pub employee: Option<String>,
	pub text: String,
	pub specialist_type: String,
	pub grade: String,
	pub is_active: bool,
	pub created_at: DateTime<Utc>,
}

impl TryFrom<ResumeRow> for Resume {
	type Error = PipelineError;

	fn try_from(row: ResumeRow) -> Result<Self, Self::Error> {
		Ok(Self {
			id: row.id,
			employee: row.employee,
			text: row.text,
			specialist_type: SpecialistType::from_str(&row.specialist_type)?,
			grade: Grade::from_str(&row.grade)?,
			is_active: row.is_active,
			created_at: row.created_at,
		})
	}
}

#[derive(sqlx::FromRow)]
pub struct MatchRow {
	pub id: Uuid,
	pub vacancy_id: Uuid,
	pub resume_id: Uuid,
	pub score: i16,
	pub is_recommended: bool,
	pub comments: serde_json::Value,
	pub created_at: DateTime<Utc>,
}

impl TryFrom<MatchRow> for VacancyResumeMatch {
	type Error = PipelineError;

	fn try_from(row: MatchRow) -> Result<Self, Self::Error> {
		Ok(Self {
			id: row.id,
			vacancy_id: row.vacancy_id,
			resume_id: row.resume_id,
			score: u8::try_from(row.score).map_err(|e| PipelineError::validation(format!("invalid match score: {e}")))?,
			is_recommended: row.is_recommended,
			comments: serde_json::from_value::<Vec<MatchComment>>(row.comments)?,
			created_at: row.created_at,
		})
	}
}
