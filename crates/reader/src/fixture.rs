//! Sample exchange file shared by the reader tests.
//!
//! Four surveyed points form a 10 x 10 square. Two boundary lines run
//! 1-2-3 and 3-4-1 and together enclose parcel 100; parcel 200 only touches
//! the first line and so stays open. Point 5 has no coordinates. The owner
//! block covers quoting, a field count mismatch and a continued line.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use vfk_source::Encoding;

pub(crate) const BLOCKS: usize = 5;
pub(crate) const RECORDS: usize = 18;
pub(crate) const GEOMETRIES: usize = 9;

pub(crate) const SAMPLE: &str = "\
&HVERZE;\"3.2\"
&HVYTVORENO;\"16.10.2026 10:00:00\"
&HCODEPAGE;\"EE8MSWIN1250\"
&HZMENY;0
&BSOBR;ID N30;CISLO_BODU N12;SOURADNICE_Y N10.2;SOURADNICE_X N10.2
&DSOBR;1;1;100.00;100.00
&DSOBR;2;2;110.00;100.00
&DSOBR;3;3;110.00;110.00
&DSOBR;4;4;100.00;110.00
&DSOBR;5;5;;
&BSBP;ID N30;HP_ID N30;BP_ID N30;PORADOVE_CISLO_BODU N4
&DSBP;1;10;1;1
&DSBP;2;10;2;2
&DSBP;3;10;3;3
&DSBP;4;11;3;1
&DSBP;5;11;4;2
&DSBP;6;11;1;3
&BHP;ID N30;PAR_ID_1 N30;PAR_ID_2 N30
&DHP;10;100;200
&DHP;11;100;
&BPAR;ID N30;KMENOVE_CISLO_PAR N5;DRUH_POZEMKU T40
&DPAR;100;12;\"orná půda\"
&DPAR;200;13;\"zahrada\"
&BOPSUB;ID N30;NAZEV T100
&DOPSUB;1;\"Novák Jiří\"
&DOPSUB;2;\"Firma \"\"ABC\"\"\"
&DOPSUB;3;\"Chybný\";42
&DOPSUB;4;\"Dlouhý ¤
název\"
&K
";

/// Write `text` in the given encoding.
pub(crate) fn write_encoded(path: &Path, text: &str, encoding: Encoding) {
    std::fs::write(path, encoding.encode(text)).unwrap();
}

/// Write the sample as `name` inside `dir`.
pub(crate) fn sample(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    write_encoded(&path, SAMPLE, Encoding::Windows1250);
    path
}

/// Move a file's modification time into the past.
pub(crate) fn age(path: &Path, by: Duration) {
    let file = std::fs::OpenOptions::new().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - by).unwrap();
}
