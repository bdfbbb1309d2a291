//! Human-readable breakdowns of why a posting matched a student.

use std::collections::HashMap;
use std::sync::Arc;

use internmatch_core::config::MatchingConfig;
use internmatch_core::{Error, Internship, ProfileSnapshot, Result, StudentProfile, WorkType};
use serde::{Deserialize, Serialize};

use crate::scoring::{MatchQuality, MatchScore, to_percentage};
use crate::skills::{SkillMatchReport, SkillMatchType, SkillSignatureManager, normalize_skill};

const MAX_MISSING_SKILLS: usize = 10;
const MAX_EXTRA_SKILLS: usize = 5;
const MAX_STRENGTHS: usize = 5;
const MAX_IMPROVEMENTS: usize = 4;
const MAX_REASONS: usize = 5;
const MAX_ACTION_ITEMS: usize = 4;
const MAX_INSIGHTS: usize = 4;
const DEFAULT_EXPECTED_STIPEND: f64 = 10_000.0;
const UNKNOWN_LEVEL: &str = "Unknown";

/// Coverage band of the skill match percentage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillStrength {
    /// 80% and up
    Strong,
    /// 60% and up
    Good,
    /// 45% and up
    Moderate,
    /// 35% and up
    Developing,
    /// Below 35%
    #[default]
    Emerging,
}

impl SkillStrength {
    /// Band of a skill match percentage.
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 80.0 {
            Self::Strong
        } else if percentage >= 60.0 {
            Self::Good
        } else if percentage >= 45.0 {
            Self::Moderate
        } else if percentage >= 35.0 {
            Self::Developing
        } else {
            Self::Emerging
        }
    }
}

/// One required skill the student covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedSkill {
    /// The student's skill
    pub skill: String,
    /// Requirement this skill covers when it is not an exact match
    pub matches_required: Option<String>,
    /// Proficiency the student declared
    pub level: String,
    /// How closely it covers the requirement
    pub match_type: SkillMatchType,
    /// Cosine similarity, 1 for exact matches
    pub similarity: f32,
}

/// Skill side of an explanation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillAnalysis {
    /// Covered requirements
    pub matching_skills: Vec<MatchedSkill>,
    /// Uncovered requirements
    pub missing_skills: Vec<String>,
    /// Student skills the posting does not ask for
    pub extra_skills: Vec<String>,
    /// Weighted coverage percentage
    pub match_percentage: f64,
    /// Distinct requirements
    pub total_required: usize,
    /// Covered requirements
    pub total_matched: usize,
    /// Requirements covered by a similar skill
    pub semantic_matches: usize,
    /// Band of `match_percentage`
    pub strength: SkillStrength,
    /// One-sentence summary
    pub explanation: String,
}

/// How the student would get to the posting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Commute {
    /// Fully remote
    Remote,
    /// Partly remote
    Hybrid,
    /// Posting location names the student's location
    SameArea,
    /// Posting city names the student's location
    SameCity,
    /// Anywhere else
    #[default]
    Relocation,
}

/// Location side of an explanation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationAnalysis {
    /// Where the student is
    pub user_location: String,
    /// Where the posting is
    pub internship_location: String,
    /// Commute category
    pub commute: Commute,
    /// Posting is remote
    pub is_remote: bool,
    /// Location dimension score as a percentage
    pub match_score: f64,
}

/// Market band of an offered stipend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StipendBand {
    /// 40,000 and up
    Exceptional,
    /// 25,000 and up
    Excellent,
    /// 15,000 and up
    Competitive,
    /// 8,000 and up
    Moderate,
    /// 5,000 and up
    Basic,
    /// Below 5,000
    #[default]
    Minimal,
}

impl StipendBand {
    /// Band of a monthly stipend.
    pub fn from_amount(amount: f64) -> Self {
        if amount >= 40_000.0 {
            Self::Exceptional
        } else if amount >= 25_000.0 {
            Self::Excellent
        } else if amount >= 15_000.0 {
            Self::Competitive
        } else if amount >= 8_000.0 {
            Self::Moderate
        } else if amount >= 5_000.0 {
            Self::Basic
        } else {
            Self::Minimal
        }
    }
}

/// Stipend side of an explanation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StipendAnalysis {
    /// Offered amount
    pub offered: f64,
    /// Currency of `offered`
    pub currency: String,
    /// What the student hopes for
    pub expectation: f64,
    /// `offered` reaches `expectation`
    pub meets_expectation: bool,
    /// Market band of `offered`
    pub market: StipendBand,
}

/// Length class of a posting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationFit {
    /// Up to six weeks
    ShortTerm,
    /// Up to three months
    #[default]
    Standard,
    /// Up to six months
    Extended,
    /// Longer
    LongTerm,
}

impl DurationFit {
    /// Class of a duration in months.
    pub fn from_months(months: f64) -> Self {
        if months <= 1.5 {
            Self::ShortTerm
        } else if months <= 3.0 {
            Self::Standard
        } else if months <= 6.0 {
            Self::Extended
        } else {
            Self::LongTerm
        }
    }
}

/// Timeline side of an explanation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimelineAnalysis {
    /// Duration as posted
    pub duration: String,
    /// Duration in months
    pub duration_months: f64,
    /// Length class
    pub fit: DurationFit,
}

/// Full explanation attached to a recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchExplanation {
    /// Weighted score as a percentage, one decimal
    pub overall_score: f64,
    /// Tier of `overall_score`
    pub match_quality: MatchQuality,
    /// Skills
    pub skill_analysis: SkillAnalysis,
    /// Location
    pub location_analysis: LocationAnalysis,
    /// Stipend
    pub stipend_analysis: StipendAnalysis,
    /// Timeline
    pub timeline_analysis: TimelineAnalysis,
    /// What speaks for the match
    pub key_strengths: Vec<String>,
    /// Gaps worth closing
    pub areas_to_improve: Vec<String>,
    /// Short reasons shown with the recommendation
    pub recommendation_reasons: Vec<String>,
    /// Concrete next steps
    pub action_items: Vec<String>,
    /// Observations about fit
    pub compatibility_insights: Vec<String>,
    /// One-paragraph summary
    pub summary: String,
}

impl MatchExplanation {
    /// Placeholder used when a full explanation cannot be generated.
    pub fn minimal(match_percentage: f64, quality: MatchQuality) -> Self {
        Self {
            overall_score: (match_percentage * 10.0).round() / 10.0,
            match_quality: quality,
            skill_analysis: SkillAnalysis::default(),
            location_analysis: LocationAnalysis::default(),
            stipend_analysis: StipendAnalysis::default(),
            timeline_analysis: TimelineAnalysis::default(),
            key_strengths: Vec::new(),
            areas_to_improve: Vec::new(),
            recommendation_reasons: vec![format!("Match score: {match_percentage:.0}%")],
            action_items: Vec::new(),
            compatibility_insights: Vec::new(),
            summary: "Good match based on your profile".to_owned(),
        }
    }
}

/// Builds [`MatchExplanation`]s using the semantic skill matcher.
pub struct MatchExplanationGenerator {
    skills: Arc<SkillSignatureManager>,
    tiers: MatchingConfig,
}

impl MatchExplanationGenerator {
    /// Generator using `skills` and the quality tiers in `tiers`.
    pub fn new(skills: Arc<SkillSignatureManager>, tiers: MatchingConfig) -> Self {
        Self { skills, tiers }
    }

    /// Quality tier for a match percentage.
    pub fn quality(&self, match_percentage: f64) -> MatchQuality {
        MatchQuality::from_percentage(match_percentage, &self.tiers)
    }

    /// Explain how `internship` matches `student`.
    ///
    /// # Errors
    /// Returns [`Error::ExplanationGeneration`] if the scores are not finite numbers or
    /// the skills cannot be matched
    pub async fn generate_explanation(
        &self,
        student: &StudentProfile,
        internship: &Internship,
        score: &MatchScore,
        profile: &ProfileSnapshot,
    ) -> Result<MatchExplanation> {
        let dims = score.dimensions;
        let all_finite = [dims.skills, dims.location, dims.stipend, dims.timeline, score.weighted_score]
            .iter()
            .all(|value| value.is_finite());
        if !all_finite {
            return Err(Error::ExplanationGeneration(format!(
                "non-finite score for internship {}",
                internship.id
            )));
        }

        let percentage = score.weighted_score * 100.0;
        let quality = self.quality(percentage);

        let required = required_skills(internship);
        let report = self
            .skills
            .find_skill_matches(&profile.skills, &required)
            .await
            .map_err(|error| {
                Error::ExplanationGeneration(format!(
                    "skill matching failed for internship {}: {error}",
                    internship.id
                ))
            })?;
        let skill_analysis = skill_analysis(&report, profile, &required);
        let location_analysis = location_analysis(student, internship, dims.location);
        let stipend_analysis = stipend_analysis(student, internship);
        let timeline_analysis = TimelineAnalysis {
            duration: internship.duration.clone(),
            duration_months: internship.duration_months,
            fit: DurationFit::from_months(internship.duration_months),
        };

        let explanation = MatchExplanation {
            overall_score: (percentage * 10.0).round() / 10.0,
            match_quality: quality,
            key_strengths: key_strengths(&skill_analysis, &location_analysis, &stipend_analysis),
            areas_to_improve: areas_to_improve(&skill_analysis, internship),
            recommendation_reasons: recommendation_reasons(
                &skill_analysis,
                &location_analysis,
                internship,
            ),
            action_items: action_items(&skill_analysis, &location_analysis, internship),
            compatibility_insights: compatibility_insights(quality, profile, internship),
            summary: summary(
                percentage,
                &skill_analysis,
                &location_analysis,
                &stipend_analysis,
                &timeline_analysis,
            ),
            skill_analysis,
            location_analysis,
            stipend_analysis,
            timeline_analysis,
        };
        Ok(explanation)
    }
}

/// Skills a posting asks for; falls back to `requirements` when `skills` is empty.
fn required_skills(internship: &Internship) -> Vec<String> {
    if internship.skills.is_empty() {
        internship.requirements.clone()
    } else {
        internship.skills.clone()
    }
}

fn skill_analysis(
    report: &SkillMatchReport,
    profile: &ProfileSnapshot,
    required: &[String],
) -> SkillAnalysis {
    // Reports carry normalized names; show them as the posting or student wrote them.
    let display: HashMap<String, &str> = profile
        .skills
        .iter()
        .chain(required)
        .map(|skill| (normalize_skill(skill), skill.trim()))
        .collect();
    let shown = |skill: &String| {
        display
            .get(skill)
            .map_or_else(|| skill.clone(), |original| (*original).to_owned())
    };
    let level = |skill: &str| {
        profile
            .level_of(skill)
            .unwrap_or(UNKNOWN_LEVEL)
            .to_owned()
    };

    let mut matching_skills: Vec<MatchedSkill> = report
        .exact_matches
        .iter()
        .map(|skill| MatchedSkill {
            skill: shown(skill),
            matches_required: None,
            level: level(skill),
            match_type: SkillMatchType::Exact,
            similarity: 1.0,
        })
        .collect();
    matching_skills.extend(report.semantic_matches.iter().map(|semantic| MatchedSkill {
        skill: shown(&semantic.user_skill),
        matches_required: Some(shown(&semantic.required_skill)),
        level: level(&semantic.user_skill),
        match_type: semantic.match_type,
        similarity: semantic.similarity,
    }));

    let strength = SkillStrength::from_percentage(report.match_score);
    let explanation = if report.total_required == 0 {
        "This posting does not list specific skill requirements.".to_owned()
    } else if report.semantic_matches.is_empty() {
        format!(
            "You have {} of the {} required skills.",
            report.total_matched, report.total_required
        )
    } else {
        format!(
            "You have {} of the {} required skills, {} through closely related experience.",
            report.total_matched,
            report.total_required,
            report.semantic_matches.len()
        )
    };

    SkillAnalysis {
        matching_skills,
        missing_skills: report
            .missing_skills
            .iter()
            .take(MAX_MISSING_SKILLS)
            .map(shown)
            .collect(),
        extra_skills: report
            .extra_skills
            .iter()
            .take(MAX_EXTRA_SKILLS)
            .map(shown)
            .collect(),
        match_percentage: report.match_score,
        total_required: report.total_required,
        total_matched: report.total_matched,
        semantic_matches: report.semantic_matches.len(),
        strength,
        explanation,
    }
}

fn location_analysis(
    student: &StudentProfile,
    internship: &Internship,
    location_score: f64,
) -> LocationAnalysis {
    let user_location = student.location_query.trim().to_owned();
    let needle = user_location.to_lowercase();
    let commute = match internship.work_kind() {
        WorkType::Remote => Commute::Remote,
        _ if internship.is_remote => Commute::Remote,
        WorkType::Hybrid => Commute::Hybrid,
        WorkType::Office if needle.is_empty() => Commute::Relocation,
        WorkType::Office if internship.location.to_lowercase().contains(&needle) => {
            Commute::SameArea
        }
        WorkType::Office if internship.city.to_lowercase().contains(&needle) => Commute::SameCity,
        WorkType::Office => Commute::Relocation,
    };

    LocationAnalysis {
        user_location,
        internship_location: internship.location.clone(),
        commute,
        is_remote: commute == Commute::Remote,
        match_score: to_percentage(location_score, 1),
    }
}

fn stipend_analysis(student: &StudentProfile, internship: &Internship) -> StipendAnalysis {
    let expectation = student
        .preferred_stipend
        .filter(|amount| *amount > 0.0)
        .unwrap_or(DEFAULT_EXPECTED_STIPEND);
    StipendAnalysis {
        offered: internship.stipend,
        currency: internship.stipend_currency.clone(),
        expectation,
        meets_expectation: internship.stipend >= expectation,
        market: StipendBand::from_amount(internship.stipend),
    }
}

fn key_strengths(
    skills: &SkillAnalysis,
    location: &LocationAnalysis,
    stipend: &StipendAnalysis,
) -> Vec<String> {
    let mut strengths = Vec::new();

    if skills.match_percentage >= 70.0 {
        strengths.push(format!(
            "Strong skill fit ({:.0}% of required skills)",
            skills.match_percentage
        ));
    } else if !skills.matching_skills.is_empty() {
        let top: Vec<&str> = skills
            .matching_skills
            .iter()
            .take(3)
            .map(|matched| matched.skill.as_str())
            .collect();
        strengths.push(format!("Relevant skills: {}", top.join(", ")));
    }
    if skills.semantic_matches > 0 {
        strengths.push(format!(
            "{} related skill(s) transfer to this role",
            skills.semantic_matches
        ));
    }
    if location.is_remote {
        strengths.push("Remote-friendly position".to_owned());
    } else if location.match_score >= 80.0 {
        strengths.push("Convenient location".to_owned());
    }
    if stipend.offered >= 20_000.0 {
        strengths.push(format!("Well-paid ({} {:.0}/month)", stipend.currency, stipend.offered));
    }
    if !skills.extra_skills.is_empty() {
        strengths.push(format!(
            "Additional skills to stand out: {}",
            skills.extra_skills.join(", ")
        ));
    }

    strengths.truncate(MAX_STRENGTHS);
    strengths
}

fn areas_to_improve(skills: &SkillAnalysis, internship: &Internship) -> Vec<String> {
    let mut areas: Vec<String> = skills
        .missing_skills
        .iter()
        .take(3)
        .map(|skill| format!("Learn {skill}"))
        .collect();

    if skills.total_required > 0 && skills.match_percentage < 50.0 {
        areas.push("Build projects that use the required skills".to_owned());
    }
    if skills.strength == SkillStrength::Developing && !internship.category.is_empty() {
        areas.push(format!("Take a course in {}", internship.category));
    }

    areas.truncate(MAX_IMPROVEMENTS);
    areas
}

fn recommendation_reasons(
    skills: &SkillAnalysis,
    location: &LocationAnalysis,
    internship: &Internship,
) -> Vec<String> {
    let mut reasons = Vec::new();

    if skills.total_required > 0 && skills.total_matched > 0 {
        reasons.push(format!(
            "{}/{} required skills match",
            skills.total_matched, skills.total_required
        ));
    }
    if let Some(top) = skills.matching_skills.first() {
        reasons.push(format!("Your {} experience is relevant", top.skill));
    }
    if location.is_remote {
        reasons.push("Remote work available".to_owned());
    } else if location.match_score >= 70.0 {
        reasons.push("Good location match".to_owned());
    }
    if internship.stipend >= 15_000.0 {
        reasons.push(format!("Competitive stipend of {:.0}", internship.stipend));
    }
    if !internship.category.is_empty() {
        reasons.push(format!("{} opportunity", internship.category));
    }
    if internship.is_featured {
        reasons.push("Featured posting".to_owned());
    }
    if internship.is_verified {
        reasons.push("Verified employer".to_owned());
    }

    reasons.truncate(MAX_REASONS);
    if reasons.is_empty() {
        reasons.push("Recommended based on your profile".to_owned());
    }
    reasons
}

fn action_items(
    skills: &SkillAnalysis,
    location: &LocationAnalysis,
    internship: &Internship,
) -> Vec<String> {
    let mut items = Vec::new();

    if let Some(top) = skills.matching_skills.first() {
        items.push(format!("Highlight {} in your application", top.skill));
    }
    if let Some(missing) = skills.missing_skills.first() {
        items.push(format!("Start learning {missing} before applying"));
    }
    if location.commute == Commute::Relocation && !internship.location.is_empty() {
        items.push(format!("Plan for relocation to {}", internship.location));
    }
    if internship.is_featured {
        items.push("Apply early, featured postings fill quickly".to_owned());
    }
    items.push(format!("Tailor your resume for {}", internship.display_title()));

    items.truncate(MAX_ACTION_ITEMS);
    items
}

fn compatibility_insights(
    quality: MatchQuality,
    profile: &ProfileSnapshot,
    internship: &Internship,
) -> Vec<String> {
    let mut insights = vec![
        match quality {
            MatchQuality::Excellent => "Your profile is an excellent fit for this role",
            MatchQuality::Good => "Your profile is a good fit for this role",
            MatchQuality::Moderate => "Your profile partially fits this role",
            MatchQuality::Low => "This role would stretch your current profile",
            MatchQuality::Poor => "This role is far from your current profile",
        }
        .to_owned(),
    ];

    let category = internship.category.to_lowercase();
    if !category.is_empty() {
        let relevant_field = profile.details.education.iter().find_map(|edu| {
            let field = edu.field_of_study.as_deref()?.trim();
            let lowered = field.to_lowercase();
            (!lowered.is_empty() && (category.contains(&lowered) || lowered.contains(&category)))
                .then_some(field)
        });
        if let Some(field) = relevant_field {
            insights.push(format!("Your {field} background is relevant"));
        }
    }

    match profile.details.experience.as_slice() {
        [] => {}
        [only] => insights.push(format!(
            "Prior experience as {}",
            only.role.as_deref().unwrap_or("an intern")
        )),
        many => insights.push(format!("{} prior roles add credibility", many.len())),
    }

    if !profile.details.projects.is_empty() {
        insights.push(format!(
            "{} project(s) demonstrate hands-on work",
            profile.details.projects.len()
        ));
    }

    insights.truncate(MAX_INSIGHTS);
    insights
}

fn summary(
    percentage: f64,
    skills: &SkillAnalysis,
    location: &LocationAnalysis,
    stipend: &StipendAnalysis,
    timeline: &TimelineAnalysis,
) -> String {
    let place = if location.is_remote {
        "Remote".to_owned()
    } else if location.internship_location.is_empty() {
        "Location not specified".to_owned()
    } else {
        location.internship_location.clone()
    };
    let duration = if timeline.duration.is_empty() {
        format!("{} months", timeline.duration_months)
    } else {
        timeline.duration.clone()
    };

    format!(
        "Match: {percentage:.0}% | Skills: {}/{} | {place} | Stipend: {} {:.0} | {duration}",
        skills.total_matched, skills.total_required, stipend.currency, stipend.offered
    )
}
