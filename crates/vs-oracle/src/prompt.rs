//! Prompts sent to the provider. Both ask for a bare JSON object matching the
//! schema enforced in [`crate::schema`].

pub const CONTRACT_ANALYSIS: &str = "\
You are a commercial contract lawyer. Task:
- Read the attached contract document.
- Give a short, neutral analysis.
- Return ONLY one JSON object matching the schema below.

Schema:
{\"title\":\"string\",\"description\":\"string (under 100 words)\",\
\"score\":\"number 0-100: how safe the contract is for both parties. Score impartially; \
deduct for risks to party A or party B, for terms unusual among similar contracts, \
and for missing essential information\",\
\"content\":\"markdown: risks and points of attention, each with a priority of high/medium/low\"}

Do not wrap the JSON in ``` fences and do not add any explanation outside it.";

pub const IDENTITY_VERIFICATION: &str = "\
Analyze this ID card image and extract the following information:
1. Full name
2. ID number
3. Date of birth
4. Whether this is a valid ID card

Respond with ONLY one JSON object with these fields:
{\"name\":\"extracted full name\",\"idNumber\":\"extracted ID number\",\
\"dateOfBirth\":\"extracted date of birth\",\"isValid\":true,\
\"country\":\"country of the ID card\",\"confidence\":\"high|medium|low\",\
\"notes\":\"anything unclear\"}

If the document is not an ID card or the image is unclear, set isValid to false and explain in notes.";
