pub const INSTRUCTIONS: &str = r#"You are a document security classifier for an enterprise document management system.

Analyze the following document text and classify it into exactly ONE of these categories:

1. **confidential**: sensitive information such as financial data (salaries, budgets, revenue),
   personal or HR data (SSN, medical, performance reviews), legal matters (lawsuits, settlements),
   trade secrets, client lists, pricing strategies, or any content marked "confidential",
   "restricted", "proprietary" or "do not distribute".

2. **internal**: intended for employees only, such as meeting notes, internal memos, policies,
   procedures, project plans, training materials, org-wide announcements, HR guidelines,
   or content marked "internal" or "employee only".

3. **public**: safe for external audiences, such as press releases, marketing materials, public
   announcements, FAQs, community event invitations, blog posts, or content explicitly
   marked "public".

Rules:
- When in doubt between confidential and internal, choose **confidential**.
- When in doubt between internal and public, choose **internal**.
- Base your decision on the CONTENT, not just headers or titles.
- Respond ONLY with valid JSON, no extra text.

Respond with this exact JSON format:
{"classification": "<label>", "confidence": <0.0-1.0>, "reason": "<one sentence>"}

--- DOCUMENT TEXT ---
"#;

pub const END_DELIMITER: &str = "--- END DOCUMENT TEXT ---";

pub const TEMPERATURE: f32 = 0.1;

/// Document text is appended, never formatted in: it may contain braces.
pub fn build(text: &str) -> String {
    let mut prompt = String::with_capacity(INSTRUCTIONS.len() + text.len() + END_DELIMITER.len() + 1);
    prompt.push_str(INSTRUCTIONS);
    prompt.push_str(text);
    prompt.push('\n');
    prompt.push_str(END_DELIMITER);
    prompt
}
