//! DOI normalization, URL extraction and fallback links.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::models::Source;

static DOI_ORG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[/.])doi\.org/(10\.\d{4,9}/[^\s?#]+)").expect("valid doi.org regex pattern")
});

static DOI_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)/doi/(?:abs/|full/|pdf/|epdf/)?(10\.\d{4,9}/[^\s?#]+)")
        .expect("valid /doi/ regex pattern")
});

static BIORXIV_CONTENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)biorxiv\.org/content/(?:early/\d{4}/\d{2}/\d{2}/)?(10\.1101/(?:\d{4}\.\d{2}\.\d{2}\.)?\d+)")
        .expect("valid bioRxiv regex pattern")
});

static ARXIV_ABS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)arxiv\.org/(?:abs|pdf)/(\d{4}\.\d{4,5}|[a-z\-]+(?:\.[a-z]{2})?/\d{7})")
        .expect("valid arXiv regex pattern")
});

/// Prefix of DataCite DOIs minted for arXiv preprints.
const ARXIV_DOI_PREFIX: &str = "10.48550/arXiv.";

/// Normalize a raw DOI: strip `doi:` and resolver prefixes and trailing
/// punctuation. Returns `None` unless the result starts with `10.` and has a suffix.
#[must_use]
pub fn normalize_doi(raw: &str) -> Option<String> {
    let mut doi = raw.trim();
    for prefix in [
        "https://doi.org/",
        "http://doi.org/",
        "https://dx.doi.org/",
        "http://dx.doi.org/",
        "doi.org/",
        "doi:",
    ] {
        if doi.get(..prefix.len()).is_some_and(|head| head.eq_ignore_ascii_case(prefix)) {
            doi = doi[prefix.len()..].trim_start();
            break;
        }
    }
    let doi = doi.trim_end_matches(['.', ',', ';', ')']);
    let (registrant, suffix) = doi.split_once('/')?;
    (registrant.starts_with("10.") && registrant.len() > 3 && !suffix.trim().is_empty())
        .then(|| doi.to_string())
}

/// Extract a DOI from a known URL template.
///
/// Recognizes `doi.org` and `dx.doi.org` links, publisher `/doi/10.*` paths,
/// bioRxiv content pages (version suffix dropped) and arXiv abstract pages
/// (mapped to the arXiv DataCite DOI).
#[must_use]
pub fn extract_doi(url: &str) -> Option<String> {
    for pattern in [&*DOI_ORG, &*DOI_PATH, &*BIORXIV_CONTENT] {
        if let Some(found) = pattern.captures(url).and_then(|c| c.get(1)) {
            if let Some(doi) = normalize_doi(found.as_str()) {
                return Some(doi);
            }
        }
    }
    ARXIV_ABS
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|id| format!("{ARXIV_DOI_PREFIX}{}", id.as_str()))
}

/// Canonical link for a DOI.
#[must_use]
pub fn doi_url(doi: &str) -> String {
    format!("https://doi.org/{doi}")
}

/// Whether a URL already points at a DOI resolver.
#[must_use]
pub fn is_doi_link(url: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        .is_some_and(|host| host == "doi.org" || host == "dx.doi.org")
}

/// Source-specific search link for a title.
#[must_use]
pub fn search_link(source: Option<Source>, title: &str) -> String {
    let title = title.trim();
    let built = match source {
        Some(Source::PubMed) => Url::parse_with_params("https://pubmed.ncbi.nlm.nih.gov/", &[("term", title)]),
        Some(Source::ArXiv) => Url::parse_with_params(
            "https://arxiv.org/search/",
            &[("query", title), ("searchtype", "all")],
        ),
        Some(Source::BioRxiv) => {
            let mut url = Url::parse("https://www.biorxiv.org/search/");
            if let Ok(url) = url.as_mut() {
                if let Ok(mut segments) = url.path_segments_mut() {
                    segments.pop_if_empty().push(title);
                }
            }
            url
        }
        None => Url::parse_with_params("https://scholar.google.com/scholar", &[("q", title)]),
    };
    built.map_or_else(|_| "https://scholar.google.com/".to_string(), String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_doi() {
        assert_eq!(normalize_doi("doi:10.1000/xyz").as_deref(), Some("10.1000/xyz"));
        assert_eq!(normalize_doi(" https://doi.org/10.1000/XYZ. ").as_deref(), Some("10.1000/XYZ"));
        assert_eq!(normalize_doi("DOI: 10.1000/abc").as_deref(), Some("10.1000/abc"));
        assert_eq!(normalize_doi("11.1000/xyz"), None);
        assert_eq!(normalize_doi("10.1000"), None);
        assert_eq!(normalize_doi(""), None);
    }

    #[test]
    fn test_extract_doi_templates() {
        assert_eq!(extract_doi("https://doi.org/10.1038/nature12373").as_deref(), Some("10.1038/nature12373"));
        assert_eq!(extract_doi("http://dx.doi.org/10.1038/x?via=1").as_deref(), Some("10.1038/x"));
        assert_eq!(
            extract_doi("https://journals.example.org/doi/full/10.1016/j.cell.2024.01.001").as_deref(),
            Some("10.1016/j.cell.2024.01.001")
        );
        assert_eq!(
            extract_doi("https://www.biorxiv.org/content/10.1101/2024.10.14.618000v2.full").as_deref(),
            Some("10.1101/2024.10.14.618000")
        );
        assert_eq!(
            extract_doi("http://arxiv.org/abs/2410.01234v1").as_deref(),
            Some("10.48550/arXiv.2410.01234")
        );
        assert_eq!(extract_doi("https://pubmed.ncbi.nlm.nih.gov/39000001/"), None);
    }

    #[test]
    fn test_search_links_escape_title() {
        let link = search_link(Some(Source::PubMed), "Clonal dynamics in hematopoiesis");
        assert_eq!(link, "https://pubmed.ncbi.nlm.nih.gov/?term=Clonal+dynamics+in+hematopoiesis");

        let link = search_link(Some(Source::ArXiv), "A & B");
        assert_eq!(link, "https://arxiv.org/search/?query=A+%26+B&searchtype=all");

        let link = search_link(Some(Source::BioRxiv), "cell/atlas");
        assert_eq!(link, "https://www.biorxiv.org/search/cell%2Fatlas");

        let link = search_link(None, "x");
        assert_eq!(link, "https://scholar.google.com/scholar?q=x");
    }

    #[test]
    fn test_is_doi_link() {
        assert!(is_doi_link("https://doi.org/10.1/x"));
        assert!(!is_doi_link("https://pubmed.ncbi.nlm.nih.gov/1/"));
        assert!(!is_doi_link("not a url"));
    }
}
