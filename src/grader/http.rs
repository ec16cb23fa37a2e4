use std::path::Path;

use async_trait::async_trait;
use reqwest::multipart;
use reqwest::{Client, Url};

use crate::error::GraderError;
use crate::grader::page::{self, Form};
use crate::grader::{CompilerMessage, GradingSurface, LoginOutcome, Problem};

/// Path of the problem list page, relative to the site root.
const LIST_PATH: &str = "/main/list";

/// Grading site client. Holds the login cookie, so one instance is one
/// authenticated session.
#[derive(Debug, Clone)]
pub struct HttpGrader {
    base: Url,
    client: Client,
}

impl HttpGrader {
    pub fn new(base_url: &str) -> Result<Self, GraderError> {
        let base = Url::parse(base_url)
            .map_err(|e| GraderError::Page(format!("invalid grader URL {base_url:?}: {e}")))?;
        let client = Client::builder().cookie_store(true).build()?;
        Ok(Self { base, client })
    }

    fn url(&self, path_or_url: &str) -> Result<Url, GraderError> {
        self.base
            .join(path_or_url)
            .map_err(|e| GraderError::Page(format!("invalid link {path_or_url:?}: {e}")))
    }

    async fn get_text(&self, path_or_url: &str) -> Result<String, GraderError> {
        let url = self.url(path_or_url)?;
        tracing::debug!(url = %url, "GET");
        Ok(self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?)
    }

    async fn list_page(&self) -> Result<String, GraderError> {
        self.get_text(LIST_PATH).await
    }
}

#[async_trait]
impl GradingSurface for HttpGrader {
    async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, GraderError> {
        let landing = self.get_text("/").await?;
        let Form { action, mut hidden } =
            page::first_form(&landing).ok_or(GraderError::MissingLoginForm)?;
        hidden.push(("login".to_string(), username.to_string()));
        hidden.push(("password".to_string(), password.to_string()));

        let body = self
            .client
            .post(self.url(&action)?)
            .form(&hidden)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        if page::is_wrong_password(&body) {
            tracing::info!(username, "Grader rejected password");
            Ok(LoginOutcome::WrongPassword)
        } else {
            tracing::info!(username, "Logged into grader");
            Ok(LoginOutcome::Accepted)
        }
    }

    async fn problems(&self) -> Result<Vec<Problem>, GraderError> {
        let html = self.list_page().await?;
        if page::problem_options(&html).is_empty() {
            return Err(GraderError::Page(format!(
                "no <select id=\"{}\"> on problem list",
                page::PROBLEM_SELECT_ID
            )));
        }
        Ok(page::problems(&html))
    }

    async fn compiler_message(&self, link: &str) -> Result<CompilerMessage, GraderError> {
        let html = self.get_text(link).await?;
        Ok(page::compiler_message(&html))
    }

    async fn submit(&self, problem_id: i64, file: &Path) -> Result<(), GraderError> {
        let html = self.list_page().await?;
        let form = page::first_form(&html).ok_or(GraderError::MissingSubmitForm)?;

        let contents = tokio::fs::read(file).await.map_err(|source| GraderError::Io {
            path: file.to_path_buf(),
            source,
        })?;
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.display().to_string());

        let mut multipart_form = multipart::Form::new();
        for (name, value) in form.hidden {
            multipart_form = multipart_form.text(name, value);
        }
        multipart_form = multipart_form
            .text("submission[problem_id]", problem_id.to_string())
            .part(
                "file",
                multipart::Part::bytes(contents)
                    .file_name(file_name)
                    .mime_str("text/plain")?,
            );

        self.client
            .post(self.url(&form.action)?)
            .multipart(multipart_form)
            .send()
            .await?
            .error_for_status()?;
        tracing::info!(problem_id, file = %file.display(), "Submitted");
        Ok(())
    }
}
