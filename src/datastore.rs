//! The Data Store Adapter: HTTP POST/GET of opaque byte blobs keyed by
//! `(job_id, event_id)`.

use std::path::{Path, PathBuf};

use reqwest::blocking::Client;

use crate::error::DataStoreError;

const USER_AGENT: &str = "python service";

pub struct DataStoreAdapter {
	base_url: String,
	client: Client,
}

impl DataStoreAdapter {
	pub fn new(address: &str) -> Self {
		let address = address.trim_start_matches("http://").trim_start_matches("https://");
		Self { base_url: format!("http://{}", address), client: Client::new() }
	}

	/// POSTs `bytes` to `/data/<job_id>`; returns the digit-string key the
	/// Data Store assigns.
	pub fn put_bytes(&self, bytes: &[u8], job_id: u64) -> Result<String, DataStoreError> {
		let url = format!("{}/data/{}", self.base_url, job_id);
		let response = self
			.client
			.post(&url)
			.header(reqwest::header::USER_AGENT, USER_AGENT)
			.header(reqwest::header::CONTENT_LENGTH, bytes.len())
			.body(bytes.to_vec())
			.send()?;
		if response.status().as_u16() != 201 {
			return Err(DataStoreError::Http(format!("{} from {}", response.status(), url)));
		}
		let body = response.text()?;
		extract_key(&body).ok_or(DataStoreError::NoKey)
	}

	pub fn put_file(&self, path: &Path, job_id: u64) -> Result<String, DataStoreError> {
		let bytes = std::fs::read(path)?;
		self.put_bytes(&bytes, job_id)
	}

	/// GETs `/data/<job_id>/<event_id>`; returns the raw body.
	pub fn get_file(&self, job_id: u64, event_id: &str) -> Result<Vec<u8>, DataStoreError> {
		let url = format!("{}/data/{}/{}", self.base_url, job_id, event_id);
		let response = self.client.get(&url).header(reqwest::header::USER_AGENT, USER_AGENT).send()?;
		if response.status().as_u16() != 200 {
			return Err(DataStoreError::Http(format!("{} from {}", response.status(), url)));
		}
		Ok(response.bytes()?.to_vec())
	}

	pub fn save_file(&self, job_id: u64, event_id: &str, path: &Path) -> Result<(), DataStoreError> {
		let content = self.get_file(job_id, event_id)?;
		std::fs::write(path, content)?;
		Ok(())
	}

	/// Writes the fetched body to a new `.tmp` file and returns its path;
	/// the caller removes it via `remove_tmp`.
	pub fn save_tmp(
		&self,
		job_id: u64,
		event_id: &str,
		prefix: Option<&str>,
		dir: Option<&Path>,
	) -> Result<PathBuf, DataStoreError> {
		let content = self.get_file(job_id, event_id)?;
		let mut builder = tempfile::Builder::new();
		builder.prefix(prefix.unwrap_or("hsn2")).suffix(".tmp");
		let file = match dir {
			Some(dir) => builder.tempfile_in(dir)?,
			None => builder.tempfile()?,
		};
		std::io::Write::write_all(&mut file.as_file(), &content)?;
		let (_, path) = file.keep().map_err(|e| DataStoreError::Io(e.error))?;
		Ok(path)
	}

	pub fn remove_tmp(&self, path: &Path) -> Result<(), DataStoreError> {
		if path.exists() {
			std::fs::remove_file(path)?;
		}
		Ok(())
	}
}

fn extract_key(body: &str) -> Option<String> {
	let start = body.find(|c: char| c.is_ascii_digit())?;
	let rest = &body[start..];
	let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or_else(|| rest.len());
	Some(rest[..end].to_string())
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn extracts_leading_digit_run() {
		assert_eq!(extract_key("key=482910"), Some("482910".to_string()));
		assert_eq!(extract_key("482910"), Some("482910".to_string()));
		assert_eq!(extract_key("no digits here"), None);
	}
}
