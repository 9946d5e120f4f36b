use irismatch::queries::{self, Answer, Question, TypeCount};
use irismatch::{Config, DataRoot, IrisDump, ReconcileError, ShardSource};
use pretty_assertions::assert_eq;
use std::fs::File;
use std::io::Write;
use std::path::Path;

const MASTER: &str = "\
ITEM_ID,OWNING_COLLECTION,OWNING_COLLECTION_DES,DATE_ISSUED_YEAR,TITLE
1,35,01.01 Articolo in rivista,2020,Alpha
2,41,02.01 Contributo in volume,2020,Alpha again
3,35,01.01 Articolo in rivista,2021,Beta
4,49,03.01 Monografia,2018,Gamma
";

const IDENTIFIER: &str = "\
ITEM_ID,IDE_DOI,IDE_ISBN,IDE_PMID
1,https://doi.org/10.1000/a,,
2,10.1000/A,,
3,10.1000/b,,
4,,,
";

const META_SHARD: &str = "\
id,title,author,pub_date,venue,type
omid:br/1 doi:10.1000/a,Alpha,,2020,,journal article
omid:br/2 doi:10.1000/b pmid:99,Beta,,2021-03,,journal article
omid:br/3 doi:10.1000/c,Unrelated,,2019,,book
";

const INDEX_SHARD: &str = "\
id,citing,cited,creation,timespan
oci:1,omid:br/1,omid:br/2,2021,P1Y
oci:2,omid:br/1,omid:br/9,2020,P0Y
oci:3,omid:br/8,omid:br/2,2022,P1Y
oci:4,omid:br/7,omid:br/6,2022,P1Y
";

fn write_iris(dir: &Path) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join("ODS_L1_IR_ITEM_MASTER_ALL.csv"), MASTER).unwrap();
    std::fs::write(dir.join("ODS_L1_IR_ITEM_IDENTIFIER.csv"), IDENTIFIER).unwrap();
    std::fs::write(
        dir.join("ODS_L1_IR_ITEM_DESCRIPTION.csv"),
        "ITEM_ID,DES_ALLPEOPLE,DES_NUMBEROFAUTHORS\n4,Verdi,1\n",
    )
    .unwrap();
    std::fs::write(
        dir.join("ODS_L1_IR_ITEM_PUBLISHER.csv"),
        "ITEM_ID,PUB_NAME,PUB_PLACE,PUB_COUNTRY\n",
    )
    .unwrap();
    std::fs::write(dir.join("ODS_L1_IR_ITEM_LANGUAGE.csv"), "ITEM_ID,LAN_ISO\n4,ita\n").unwrap();
}

fn write_zip(path: &Path, name: &str, content: &str) {
    let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
    zip.start_file(name, zip::write::SimpleFileOptions::default())
        .unwrap();
    zip.write_all(content.as_bytes()).unwrap();
    zip.finish().unwrap();
}

#[test]
fn test_full_pipeline() {
    let work = tempfile::tempdir().unwrap();
    let iris_dir = work.path().join("iris");
    write_iris(&iris_dir);

    let meta_path = work.path().join("meta.zip");
    write_zip(&meta_path, "csv/0001.csv", META_SHARD);

    let index_dir = work.path().join("index");
    std::fs::create_dir(&index_dir).unwrap();
    write_zip(&index_dir.join("2023-01.zip"), "2023-01.csv", INDEX_SHARD);

    let data = DataRoot::new(work.path().join("data"));
    let config = Config::default();
    let iris = IrisDump::open(&iris_dir).unwrap();

    // nothing to answer yet
    let err = queries::answer(Question::Coverage, &data).unwrap_err();
    assert!(matches!(err, ReconcileError::MissingPrerequisite { .. }));

    let meta = ShardSource::open(&meta_path, "").unwrap();
    let summary = data.create_iris_in_meta(&iris, &meta, &config).unwrap();
    assert_eq!(summary.shards, 1);
    assert_eq!(summary.matched, 2);

    let matched = data.load_matched().unwrap();
    let pairs: Vec<(i64, &str, Option<&str>)> = matched
        .iter()
        .map(|r| (r.iris_id, r.omid.as_str(), r.iris_type.as_deref()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            (1, "omid:br/1", Some("01.01 Articolo in rivista")),
            (3, "omid:br/2", Some("01.01 Articolo in rivista")),
        ]
    );
    let in_meta_dir: Vec<_> = std::fs::read_dir(data.iris_in_meta_dir())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(in_meta_dir.len(), 1);

    // record 2 lost the DOI conflict, so nothing is left unmatched
    assert_eq!(data.create_iris_not_in_meta(&iris, &config).unwrap(), 0);
    assert_eq!(data.create_iris_no_id(&iris).unwrap(), 1);
    let no_id = std::fs::read_to_string(data.iris_no_id_file()).unwrap();
    assert!(no_id.contains("4,49,Gamma,2018,Verdi,1,,,,ita"));

    let index = ShardSource::open(&index_dir, "").unwrap();
    let filtered = data.create_index_in_iris(&index).unwrap();
    assert_eq!(filtered.scanned, 4);
    assert_eq!(filtered.kept, 3);

    assert_eq!(
        queries::answer(Question::Coverage, &data).unwrap(),
        Answer::Count(2)
    );
    assert_eq!(
        queries::answer(Question::TypeCoverage, &data).unwrap(),
        Answer::Types(vec![TypeCount {
            label: "journal article".to_string(),
            count: 2
        }])
    );
    assert_eq!(
        queries::answer(Question::Citations, &data).unwrap(),
        Answer::Count(3)
    );
    assert_eq!(
        queries::answer(Question::OutsideCitations, &data).unwrap(),
        Answer::Outside {
            citing: 1,
            cited: 1
        }
    );
    assert_eq!(
        queries::answer(Question::InternalCitations, &data).unwrap(),
        Answer::Count(1)
    );
}

#[test]
fn test_matched_never_exceeds_resolved() {
    let work = tempfile::tempdir().unwrap();
    let iris_dir = work.path().join("iris");
    write_iris(&iris_dir);

    // every Meta entity appears twice, in two shards
    let meta_dir = work.path().join("meta");
    std::fs::create_dir(&meta_dir).unwrap();
    std::fs::write(meta_dir.join("0001.csv"), META_SHARD).unwrap();
    std::fs::write(
        meta_dir.join("0002.csv"),
        META_SHARD
            .replace("omid:br/1 ", "omid:br/11 ")
            .replace("omid:br/2 ", "omid:br/12 "),
    )
    .unwrap();

    let data = DataRoot::new(work.path().join("data"));
    let iris = IrisDump::open(&iris_dir).unwrap();
    let meta = ShardSource::open(&meta_dir, "").unwrap();
    let summary = data
        .create_iris_in_meta(&iris, &meta, &Config::default())
        .unwrap();

    assert_eq!(summary.candidates, 4);
    assert_eq!(summary.matched, 2);
    let omids: Vec<String> = data
        .load_matched()
        .unwrap()
        .into_iter()
        .map(|r| r.omid)
        .collect();
    assert_eq!(omids, vec!["omid:br/1", "omid:br/2"]);
}
