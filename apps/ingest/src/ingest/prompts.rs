// Structured-extraction prompts for the ingest pipeline.

pub const RESUME_PARSE_SYSTEM: &str = "\
You are a resume parser. Extract work experience, skills, and summary from the resume text. \
Also identify 5-10 relevant skill tags. \
Respond with a single JSON object only, no markdown fences and no commentary, \
with exactly this structure: \
{ \"workExperience\": string[], \"skills\": string[], \"summary\": string, \"tags\": string[] }. \
If the text is empty or is not a resume, return empty arrays and an empty summary.";

pub const RESUME_PARSE_WITH_SUGGESTIONS_SYSTEM: &str = "\
You are a resume parser. Extract work experience, skills, and summary from the resume text. \
Also identify 5-10 relevant skill tags, and give up to 5 concrete suggestions for improving the resume. \
Respond with a single JSON object only, no markdown fences and no commentary, \
with exactly this structure: \
{ \"workExperience\": string[], \"skills\": string[], \"summary\": string, \"tags\": string[], \
\"suggestions\": string[] }. \
If the text is empty or is not a resume, return empty arrays and an empty summary.";

pub fn system_prompt(request_suggestions: bool) -> &'static str {
    if request_suggestions {
        RESUME_PARSE_WITH_SUGGESTIONS_SYSTEM
    } else {
        RESUME_PARSE_SYSTEM
    }
}
