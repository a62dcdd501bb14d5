// Prompt constants and builders for the AI resume-analysis routes.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

pub const JOB_MATCH_SYSTEM: &str = "You are an expert ATS (Applicant Tracking System) analyzer. \
    Compare the resume against the job description. Return a JSON object with: \
    score (0-100), matchingKeywords (array of strings), missingKeywords (array of strings), \
    and advice (string).";

pub const COVER_LETTER_SYSTEM: &str = "You are an expert career coach. \
    Write a professional, engaging cover letter based on the candidate's resume \
    and the job description. The tone should be professional yet enthusiastic. \
    Respond with the letter text only.";

pub const INTERVIEW_PREP_SYSTEM: &str = "You are an expert interview coach. \
    Generate 5 potential interview questions based on the job description and \
    resume, along with suggested key points to cover in the answers. \
    Return a JSON object with a key 'questions' containing an array of objects \
    with 'question' and 'answerTips'.";

pub const PORTFOLIO_DESIGN_SYSTEM: &str = "You are an expert portfolio designer. \
    Analyze the resume and suggest an optimal portfolio design. \
    Return a JSON object with: colors (object with primary, accent and background \
    hex codes), font (inter|roboto|poppins|lora), layout (modern|minimal|creative), \
    and sections (object mapping hero, about, experience, skills, projects and \
    education to booleans). \
    Guidelines: tech/engineering gets a modern layout with blue/purple tones and \
    Inter; creative/design gets a creative layout with vibrant colors and Poppins; \
    business/corporate gets a minimal layout with professional colors and Roboto; \
    academic/research gets a minimal layout with muted tones and Lora. \
    Choose colors that match the industry and create good contrast.";

/// Output language for the bilingual analysis routes. Anything other than
/// the Arabic marker falls back to English.
pub fn target_language(language: Option<&str>) -> &'static str {
    match language {
        Some("ar") => "Arabic",
        _ => "English",
    }
}

pub fn ats_score_system(target_lang: &str) -> String {
    format!(
        "You are an expert ATS (Applicant Tracking System) analyzer with deep \
         knowledge of hiring practices in both English and Arabic markets. \
         Analyze the resume against the job description (if provided) or general \
         best practices. Respond in {target_lang}. \
         Return a JSON object with: score (0-100), breakdown (object with \
         categories like 'Impact', 'Keywords', 'Format', 'Content' and their \
         scores), missingKeywords (array of strings), improvements (array of \
         strings), summary (string), strengths (array of strings), and keywords \
         (array of strings listing important missing keywords), with all text \
         in {target_lang}. \
         Ensure the score is rigorous and realistic. Do not give 100% easily. \
         A good resume usually scores 70-85."
    )
}

pub fn ats_score_prompt(resume: &serde_json::Value, job_description: Option<&str>) -> String {
    format!(
        "Resume: {resume}\n\nJob Description: {}",
        job_description.unwrap_or("General Review")
    )
}

pub fn fix_resume_system(target_lang: &str) -> String {
    format!(
        "You are an expert professional resume editor. Your task is to \
         SIGNIFICANTLY IMPROVE the provided resume data based on general best \
         practices and specific ATS feedback (if provided). \
         The user's preferred language is {target_lang}. Preserve the resume's \
         original language while improving the phrasing. \
         Return the FULL resume JSON object with the exact same structure as \
         the input, but with improved content. Focus on: stronger action verbs \
         in experience, quantifiable results where possible, a better summary, \
         fixing grammar and spelling, and incorporating missing keywords when \
         ATS feedback is provided. \
         CRITICAL: Return ONLY valid JSON matching the input structure."
    )
}

pub fn fix_resume_prompt(
    resume: &serde_json::Value,
    ats_feedback: Option<&serde_json::Value>,
) -> String {
    format!(
        "Resume Data: {resume}\n\nATS Feedback (optional): {}",
        ats_feedback.unwrap_or(&serde_json::Value::Null)
    )
}

pub fn career_analysis_system(target_lang: &str) -> String {
    format!(
        "You are an expert career advisor and CV analyst. Analyze the provided \
         resume comprehensively. Respond in {target_lang}. \
         Cover: career level detection (Junior/Mid/Senior/Lead/Executive), \
         strengths, weaknesses, red flags, recommended career path, skills to \
         develop, and actionable advice. Be honest, specific, and constructive. \
         Return ONLY valid JSON with this structure (values in {target_lang}): \
         {{\"careerLevel\": string, \"yearsExperience\": number, \
         \"strengths\": [{{\"area\", \"description\", \"score\" (0-100)}}], \
         \"weaknesses\": [{{\"area\", \"description\", \"severity\" (low|medium|high)}}], \
         \"redFlags\": [{{\"issue\", \"example\", \"fix\"}}], \
         \"careerPath\": {{\"currentRole\", \"nextRoles\", \"timeline\", \"requirements\"}}, \
         \"skillsToDevelop\": [{{\"skill\", \"priority\", \"reason\"}}], \
         \"actionableAdvice\": [string]}}"
    )
}

pub fn career_analysis_prompt(resume: &serde_json::Value) -> String {
    format!("Analyze this resume:\n\n{resume}")
}

pub fn portfolio_design_prompt(resume_data: &serde_json::Value) -> String {
    format!("Analyze this resume and suggest optimal portfolio design:\n\n{resume_data}")
}

pub fn job_match_prompt(resume: &serde_json::Value, job_description: &str) -> String {
    format!("Resume: {resume}\n\nJob Description: {job_description}")
}

pub fn rewrite_system(section_type: &str, instructions: Option<&str>) -> String {
    format!(
        "You are an expert resume writer. Rewrite the following {section_type} to be \
         more professional, impactful, and result-oriented. {}",
        instructions.unwrap_or("")
    )
}

pub fn cover_letter_prompt(resume: &serde_json::Value, job_description: &str) -> String {
    format!("Candidate resume: {resume}\n\nJob description: {job_description}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rewrite_system_includes_section_and_instructions() {
        let system = rewrite_system("summary", Some("Keep it under 50 words."));
        assert!(system.contains("summary"));
        assert!(system.contains("Keep it under 50 words."));
    }

    #[test]
    fn test_rewrite_system_without_instructions() {
        let system = rewrite_system("experience bullet", None);
        assert!(system.contains("experience bullet"));
        assert!(!system.contains("None"));
    }

    #[test]
    fn test_job_match_prompt_embeds_both_inputs() {
        let prompt = job_match_prompt(&json!({"name": "Ada"}), "Rust engineer");
        assert!(prompt.contains("Ada"));
        assert!(prompt.contains("Rust engineer"));
    }

    #[test]
    fn test_target_language_defaults_to_english() {
        assert_eq!(target_language(Some("ar")), "Arabic");
        assert_eq!(target_language(Some("en")), "English");
        assert_eq!(target_language(Some("fr")), "English");
        assert_eq!(target_language(None), "English");
    }

    #[test]
    fn test_ats_score_prompt_falls_back_to_general_review() {
        let prompt = ats_score_prompt(&json!({"name": "Ada"}), None);
        assert!(prompt.contains("General Review"));

        let prompt = ats_score_prompt(&json!({"name": "Ada"}), Some("Rust engineer"));
        assert!(prompt.contains("Rust engineer"));
        assert!(!prompt.contains("General Review"));
    }

    #[test]
    fn test_ats_score_system_carries_language() {
        let system = ats_score_system("Arabic");
        assert!(system.contains("Respond in Arabic"));
    }

    #[test]
    fn test_fix_resume_prompt_embeds_feedback_when_present() {
        let feedback = json!({"missingKeywords": ["tokio"]});
        let prompt = fix_resume_prompt(&json!({"name": "Ada"}), Some(&feedback));
        assert!(prompt.contains("tokio"));

        let prompt = fix_resume_prompt(&json!({"name": "Ada"}), None);
        assert!(prompt.contains("null"));
    }
}
