//! Streaming idXML reader using quick-xml
//!
//! Only the parts needed for hit statistics are read: `ProteinHit` ids and
//! accessions, and each `PeptideHit`'s score and `protein_refs`. References
//! are resolved once the whole document has been read, so the order of the
//! protein and peptide sections does not matter.

use std::collections::HashMap;
use std::io::BufRead;

use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{IdentError, PeptideHit};

struct PendingHit {
    score: f64,
    protein_refs: Vec<String>,
}

/// Read every peptide hit of an idXML document
pub fn read_hits<R: BufRead>(reader: R) -> Result<Vec<PeptideHit>, IdentError> {
    let mut xml_reader = Reader::from_reader(reader);
    xml_reader.config_mut().trim_text(true);

    let mut accessions: HashMap<String, String> = HashMap::new();
    let mut pending: Vec<PendingHit> = Vec::new();
    let mut buf = Vec::new();

    loop {
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"ProteinHit" => {
                    let id = get_attribute(e, "id")?;
                    let accession = get_attribute(e, "accession")?;
                    if let (Some(id), Some(accession)) = (id, accession) {
                        accessions.insert(id, accession);
                    }
                }
                b"PeptideHit" => {
                    let score = get_attribute(e, "score")?.and_then(|s| s.trim().parse().ok());
                    let Some(score) = score else {
                        debug!("Skipping peptide hit without a numeric score");
                        buf.clear();
                        continue;
                    };
                    let protein_refs = get_attribute(e, "protein_refs")?
                        .map(|refs| refs.split_whitespace().map(str::to_string).collect())
                        .unwrap_or_default();
                    pending.push(PendingHit {
                        score,
                        protein_refs,
                    });
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(IdentError::XmlError(e)),
            _ => {}
        }
        buf.clear();
    }

    let hits = pending
        .into_iter()
        .map(|hit| {
            let mut resolved: Vec<String> = Vec::with_capacity(hit.protein_refs.len());
            for reference in &hit.protein_refs {
                match accessions.get(reference) {
                    Some(accession) if !resolved.contains(accession) => {
                        resolved.push(accession.clone())
                    }
                    Some(_) => {}
                    None => debug!("Unresolved protein reference {}", reference),
                }
            }
            PeptideHit {
                score: hit.score,
                accessions: resolved,
            }
        })
        .collect();

    Ok(hits)
}

fn get_attribute(e: &BytesStart, name: &str) -> Result<Option<String>, IdentError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|e| IdentError::XmlError(quick_xml::Error::from(e)))?;
        if attr.key.as_ref() == name.as_bytes() {
            let value = std::str::from_utf8(&attr.value)?.to_string();
            return Ok(Some(value));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDXML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<IdXML version="1.5">
  <SearchParameters id="SP_0" db="uniprot_sprot.fasta" charges="2,3" mass_type="monoisotopic"/>
  <IdentificationRun date="2024-03-01T10:00:00" search_engine="Comet" search_engine_version="2019.01" search_parameters_ref="SP_0">
    <ProteinIdentification score_type="" higher_score_better="true">
      <ProteinHit id="PH_0" accession="sp|P02768|ALBU_HUMAN" score="0" sequence=""/>
      <ProteinHit id="PH_1" accession="sp|P07724|ALBU_MOUSE" score="0" sequence="">
        <UserParam type="string" name="target_decoy" value="target"/>
      </ProteinHit>
    </ProteinIdentification>
    <PeptideIdentification score_type="expect" higher_score_better="false" MZ="500.2" RT="1200.5">
      <PeptideHit score="1e-06" sequence="LVNEVTEFAK" charge="2" protein_refs="PH_0 PH_1 PH_0"/>
      <PeptideHit score="0.2" sequence="QTALVELVK" charge="2" protein_refs="PH_0">
        <UserParam type="float" name="xcorr" value="1.2"/>
      </PeptideHit>
    </PeptideIdentification>
  </IdentificationRun>
</IdXML>
"#;

    #[test]
    fn test_read_hits_resolves_protein_refs() {
        let hits = read_hits(IDXML.as_bytes()).unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].score, 1e-6);
        assert_eq!(
            hits[0].accessions,
            vec!["sp|P02768|ALBU_HUMAN", "sp|P07724|ALBU_MOUSE"]
        );
        assert_eq!(hits[1].accessions, vec!["sp|P02768|ALBU_HUMAN"]);
    }

    #[test]
    fn test_read_hits_empty_document() {
        let hits = read_hits("".as_bytes()).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_read_hits_rejects_broken_xml() {
        let result = read_hits("<IdXML><ProteinIdentification></IdXML>".as_bytes());
        assert!(result.is_err());
    }
}
