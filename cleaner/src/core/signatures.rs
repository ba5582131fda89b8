//! Signature lists for the worm family.
//!
//! Every detection pass reads its tokens from one [`SignatureSet`], so the
//! text and scene detectors cannot drift apart. Matching is plain
//! case-sensitive substring search.

/// Version of the built-in signature lists. Bump when any list changes.
pub const SIGNATURE_VERSION: u32 = 1;

/// Immutable token lists used by the text and scene detectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureSet {
    pub version: u32,
    /// Any of these anywhere in a file marks the whole file as suspect.
    pub file_level: Vec<String>,
    /// Per-line tokens; a line containing one of these is removed.
    pub line_level: Vec<String>,
    /// Fragments of script node names the worm creates.
    pub node_names: Vec<String>,
    /// Extra tokens checked in script node code on top of `line_level`.
    pub scene_code: Vec<String>,
    /// Tokens identifying the worm's registered script jobs.
    pub jobs: Vec<String>,
}

impl SignatureSet {
    /// Built-in signatures for the `vaccine` / `fuckVirus` / `leukocyte` family.
    pub fn v1() -> Self {
        Self {
            version: SIGNATURE_VERSION,
            file_level: owned(&["import fuckVirus", "import vaccine", "leukocyte", "phage"]),
            line_level: owned(&[
                "fuckVirus",
                "vaccine",
                "leukocyte",
                "phage",
                "cmds.evalDeferred(",
            ]),
            node_names: owned(&["vaccine_gene", "breed_gene", "fuckVirus_gene"]),
            scene_code: owned(&["userSetup.py", "cmds.scriptJob(event=[\"SceneSaved\""]),
            jobs: owned(&["leukocyte.antivirus()", "phage", "vaccine", "fuckVirus"]),
        }
    }

    pub fn matches_file(&self, content: &str) -> bool {
        first_match(content, &self.file_level).is_some()
    }

    pub fn matches_line(&self, line: &str) -> bool {
        first_match(line, &self.line_level).is_some()
    }

    /// Returns the marker fragment contained in `node`, if any.
    pub fn node_name_marker(&self, node: &str) -> Option<&str> {
        first_match(node, &self.node_names)
    }

    /// Returns the first line-level or scene token found in script node code.
    pub fn node_code_marker(&self, code: &str) -> Option<&str> {
        first_match(code, &self.line_level).or_else(|| first_match(code, &self.scene_code))
    }

    pub fn job_marker(&self, job: &str) -> Option<&str> {
        first_match(job, &self.jobs)
    }
}

impl Default for SignatureSet {
    fn default() -> Self {
        Self::v1()
    }
}

fn first_match<'a>(haystack: &str, tokens: &'a [String]) -> Option<&'a str> {
    tokens
        .iter()
        .find(|token| !token.is_empty() && haystack.contains(token.as_str()))
        .map(String::as_str)
}

fn owned(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|token| (*token).to_string()).collect()
}
