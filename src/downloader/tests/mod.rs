use super::test_helpers::*;
use super::*;
use crate::db::ComponentQuery;
use crate::types::{ComponentKind, ComponentRequest, DownloadMode, DownloadOptions, DownloadOutcome};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};
