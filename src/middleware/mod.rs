/// Extractor for the caller's summoner identity
pub mod summoner;
