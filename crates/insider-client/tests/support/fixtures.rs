#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tempfile::{Builder, TempDir};

pub const TRANSACTION_HEADER: &str = "ACCESSION_NUMBER\tNONDERIV_TRANS_SK\tSECURITY_TITLE\tTRANS_DATE\tTRANS_SHARES\tTRANS_PRICEPERSHARE\tTRANS_ACQUIRED_DISP_CD\tSHRS_OWND_FOLWNG_TRANS";
pub const SUBMISSION_HEADER: &str =
    "ACCESSION_NUMBER\tFILING_DATE\tPERIOD_OF_REPORT\tISSUERNAME\tISSUERTRADINGSYMBOL";

pub fn temp_workspace(prefix: &str) -> std::io::Result<(TempDir, PathBuf, PathBuf)> {
    let dir = Builder::new().prefix(prefix).tempdir()?;
    let home = dir.path().join("insider-home");
    let data = dir.path().join("data");
    fs::create_dir_all(&home)?;
    fs::create_dir_all(&data)?;
    Ok((dir, home, data))
}

/// `(accession, shares, price, code, owned_following)`
pub fn transaction_line(
    accession: &str,
    shares: &str,
    price: &str,
    code: &str,
    owned: &str,
) -> String {
    format!("{accession}\t1\tCommon Stock\t01-MAR-2021\t{shares}\t{price}\t{code}\t{owned}")
}

/// `(accession, filing_date, ticker)`
pub fn submission_line(accession: &str, filing_date: &str, ticker: &str) -> String {
    format!("{accession}\t{filing_date}\t28-FEB-2021\tExample Corp\t{ticker}")
}

pub fn write_partition(
    dir: &Path,
    transactions: &[String],
    submissions: &[String],
) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    fs::write(
        dir.join("NONDERIV_TRANS.tsv"),
        with_header(TRANSACTION_HEADER, transactions),
    )?;
    fs::write(
        dir.join("SUBMISSION.tsv"),
        with_header(SUBMISSION_HEADER, submissions),
    )?;
    Ok(())
}

fn with_header(header: &str, lines: &[String]) -> String {
    let mut body = String::from(header);
    body.push('\n');
    for line in lines {
        body.push_str(line);
        body.push('\n');
    }
    body
}

pub fn stored_rows(home: &Path) -> Vec<(String, String, String, f64, f64, String, f64)> {
    let connection = Connection::open(home.join("insider.db"));
    let mut rows = Vec::new();
    if let Ok(conn) = connection {
        let statement = conn.prepare(
            "SELECT ACCESSION_NUMBER, FILING_DATE, ISSUERTRADINGSYMBOL, TRANS_SHARES,
                    TRANS_PRICEPERSHARE, TRANS_ACQUIRED_DISP_CD, SHRS_OWND_FOLWNG_TRANS
             FROM insider_data
             ORDER BY rowid",
        );
        if let Ok(mut stmt) = statement {
            let mapped = stmt.query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                ))
            });
            if let Ok(iter) = mapped {
                rows.extend(iter.flatten());
            }
        }
    }
    rows
}
