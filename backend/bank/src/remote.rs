use anyhow::Error;
use prost::Message;
use reqwest::get;

use crate::records::Bank;

pub async fn get_remote_bank(url: &str) -> Result<Bank, Error> {
    let response = get(url).await?.error_for_status()?;
    let bytes = response.bytes().await?;

    Ok(Bank::decode(&*bytes)?)
}
