use crate::model::Finding;

/// Standing instructions for the narrator.
pub const SYSTEM_PROMPT: &str = "\
You are a security analyst writing for the compliance team of a healthcare \
organization. Your readers understand HIPAA obligations but are not software \
engineers. Explain dependency vulnerabilities in plain language, state how each \
one could affect the confidentiality, integrity or availability of protected \
health information (PHI) and of clinical systems, and give concrete remediation \
steps. Never invent vulnerabilities, identifiers or versions that are not in the \
data you are given.";

/// Builds the user prompt embedding the findings as JSON.
pub fn build_prompt(findings: &[Finding]) -> String {
    let serialized =
        serde_json::to_string_pretty(findings).unwrap_or_else(|_| "[]".to_string());

    format!(
        "\
The following dependency vulnerabilities were found in the repository \
(JSON, one entry per affected package):

{serialized}

Write a security report for a healthcare compliance audience:
1. For each finding, classify its relevance to sensitive patient data (PHI \
exposure or tampering) and to service availability, and say how urgent it is.
2. For each finding, recommend remediation: the upgrade or replacement to make \
and any interim mitigation.
3. If the list above is empty, state clearly that the repository is healthy \
with no known vulnerabilities in the checked dependencies, and recommend \
continuous dependency monitoring as part of the compliance program.
Finish with a short overall risk summary."
    )
}
