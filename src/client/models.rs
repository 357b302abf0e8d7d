use serde::Deserialize;

/// A site reachable through the credential's group memberships. The slug is
/// the stable identifier; the url is a display label only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct Site {
    pub slug: String,
    pub url: String,
}

/// An organizational grouping of sites, used only while enumerating
#[derive(Debug, Clone, Deserialize)]
pub struct Group {
    pub slug: String,
}

/// One entry in a site's data-points listing
#[derive(Debug, Clone, Deserialize)]
pub struct DataPoint {
    pub date: String,
}

/// One report download to perform for a site and date
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRequest {
    pub path: String,
    pub date: String,
    pub search_appearance: Option<String>,
}

impl ReportRequest {
    /// Final path segment, the report type ("queries" or "urls")
    pub fn basename(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(self.path.as_str())
    }

    pub fn query(&self) -> Vec<(&'static str, &str)> {
        let mut params = vec![("date", self.date.as_str())];
        if let Some(appearance) = &self.search_appearance {
            params.push(("search_appearance", appearance.as_str()));
        }
        params
    }
}
