//! Source-format registry
//!
//! The FM9 header records which format a file was converted from as a
//! single byte, partitioned into ranges: 0x01-0x0F pass-through, 0x10-0x1F
//! MIDI-style, 0x20-0x5F native OPL, 0x60-0xA0 tracker. Extensions shared
//! by several formats resolve to a documented alias (`.wlf` is the IMF
//! code, `.mus` the MIDI-style code, `.s3m` the native-OPL code).

/// 1-byte source-format codes stored in the FM9 header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SourceFormat {
    Unknown = 0x00,

    // Pass-through / container formats (0x01-0x0F)
    Vgm = 0x01,
    Vgz = 0x02,
    Fm9 = 0x03,

    // MIDI-style formats (0x10-0x1F)
    Mid = 0x10,
    Kar = 0x11,
    Rmi = 0x12,
    Xmi = 0x13,
    Mus = 0x14,
    Hmp = 0x15,
    Hmi = 0x16,
    Klm = 0x17,

    // Native OPL formats (0x20-0x5F)
    Rad = 0x20,
    Imf = 0x21,
    Adlib = 0x22,
    Dro = 0x23,
    Cmf = 0x24,
    A2m = 0x25,
    A2t = 0x26,
    Amd = 0x27,
    Xms = 0x28,
    Bam = 0x29,
    Cff = 0x2A,
    D00 = 0x2B,
    Dfm = 0x2C,
    Hsc = 0x2D,
    Hsp = 0x2E,
    Ksm = 0x2F,
    Mad = 0x30,
    Mkj = 0x31,
    DtmOpl = 0x32,
    Mtk = 0x33,
    Mtr = 0x34,
    Sa2 = 0x35,
    Sat = 0x36,
    Xad = 0x37,
    Bmf = 0x38,
    Lds = 0x39,
    Plx = 0x3A,
    Xsm = 0x3B,
    Pis = 0x3C,
    Msc = 0x3D,
    Sng = 0x3E,
    Jbm = 0x3F,
    Got = 0x40,
    Sop = 0x41,
    Rol = 0x42,
    Raw = 0x43,
    Rac = 0x44,
    Laa = 0x45,
    Sci = 0x46,
    Mdi = 0x47,
    Mdy = 0x48,
    Ims = 0x49,
    Adl = 0x4A,
    Dmo = 0x4C,
    Rix = 0x4D,
    Mkf = 0x4E,
    U6m = 0x4F,
    Hsq = 0x50,
    Sqx = 0x51,
    Sdb = 0x52,
    Agd = 0x53,
    Ha2 = 0x54,

    // Tracker formats (0x60-0xA0)
    Mod = 0x60,
    S3m = 0x61,
    Xm = 0x62,
    It = 0x63,
    Mptm = 0x64,
    Stm = 0x65,
    Stx = 0x66,
    Stp = 0x67,
    C669 = 0x68,
    C667 = 0x69,
    C67 = 0x6A,
    Mtm = 0x6B,
    Med = 0x6C,
    Okt = 0x6D,
    Far = 0x6E,
    Fmt = 0x6F,
    Mdl = 0x70,
    Ams = 0x71,
    Dbm = 0x72,
    Digi = 0x73,
    Dmf = 0x74,
    Dsm = 0x75,
    Dsym = 0x76,
    Dtm = 0x77,
    Amf = 0x78,
    Psm = 0x79,
    Mt2 = 0x7A,
    Umx = 0x7B,
    J2b = 0x7C,
    Ptm = 0x7D,
    Ppm = 0x7E,
    Plm = 0x7F,
    Sfx = 0x80,
    Sfx2 = 0x81,
    Nst = 0x82,
    Wow = 0x83,
    Ult = 0x84,
    Gdm = 0x85,
    Mo3 = 0x86,
    Oxm = 0x87,
    Rtm = 0x88,
    Pt36 = 0x89,
    M15 = 0x8A,
    Stk = 0x8B,
    St26 = 0x8C,
    Unic = 0x8D,
    Ice = 0x8E,
    Mmcmp = 0x8F,
    Xpk = 0x90,
    Mms = 0x91,
    Cba = 0x92,
    Etx = 0x93,
    Fc = 0x94,
    Fc13 = 0x95,
    Fc14 = 0x96,
    Fst = 0x97,
    Ftm = 0x98,
    Gmc = 0x99,
    Gtk = 0x9A,
    Gt2 = 0x9B,
    Puma = 0x9C,
    Smod = 0x9D,
    Symmod = 0x9E,
    Tcb = 0x9F,
    Xmf = 0xA0,
}

impl SourceFormat {
    /// Map a lowercased file extension to its format code. Deterministic
    /// for shared extensions (documented aliases pick one code).
    pub fn from_extension(ext: &str) -> Self {
        use SourceFormat::*;
        match ext {
            "vgm" => Vgm,
            "vgz" => Vgz,
            "fm9" => Fm9,

            "mid" | "midi" | "smf" => Mid,
            "kar" => Kar,
            "rmi" => Rmi,
            "xmi" => Xmi,
            "mus" => Mus,
            "hmp" => Hmp,
            "hmi" => Hmi,
            "klm" => Klm,

            "rad" => Rad,
            // .wlf is id Software music too; it shares the IMF code
            "imf" | "wlf" => Imf,
            "adlib" => Adlib,
            "dro" => Dro,
            "cmf" => Cmf,
            "a2m" => A2m,
            "a2t" => A2t,
            "amd" => Amd,
            "xms" => Xms,
            "bam" => Bam,
            "cff" => Cff,
            "d00" => D00,
            "dfm" => Dfm,
            "hsc" => Hsc,
            "hsp" => Hsp,
            "ksm" => Ksm,
            "mad" => Mad,
            "mkj" => Mkj,
            "mtk" => Mtk,
            "mtr" => Mtr,
            "sa2" => Sa2,
            "sat" => Sat,
            "xad" => Xad,
            "bmf" => Bmf,
            "lds" => Lds,
            "plx" => Plx,
            "xsm" => Xsm,
            "pis" => Pis,
            "msc" => Msc,
            "sng" => Sng,
            "jbm" => Jbm,
            "got" => Got,
            "sop" => Sop,
            "rol" => Rol,
            "raw" => Raw,
            "rac" => Rac,
            "laa" => Laa,
            "sci" => Sci,
            "mdi" => Mdi,
            "mdy" => Mdy,
            "ims" => Ims,
            "adl" => Adl,
            "dmo" => Dmo,
            "rix" => Rix,
            "mkf" => Mkf,
            "m" => U6m,
            "hsq" => Hsq,
            "sqx" => Sqx,
            "sdb" => Sdb,
            "agd" => Agd,
            "ha2" => Ha2,

            "mod" => Mod,
            // .s3m may carry samples, but its OPL-instrument reading wins
            "s3m" => S3m,
            "xm" => Xm,
            "it" => It,
            "mptm" => Mptm,
            "stm" => Stm,
            "stx" => Stx,
            "stp" => Stp,
            "669" => C669,
            "667" => C667,
            "c67" => C67,
            "mtm" => Mtm,
            "med" => Med,
            "okt" => Okt,
            "far" => Far,
            "fmt" => Fmt,
            "mdl" => Mdl,
            "ams" => Ams,
            "dbm" => Dbm,
            "digi" => Digi,
            "dmf" => Dmf,
            "dsm" => Dsm,
            "dsym" => Dsym,
            // .dtm is both DeFy AdLib (native) and X-Tracker era; the
            // native-OPL code wins
            "dtm" => DtmOpl,
            "amf" => Amf,
            "psm" => Psm,
            "mt2" => Mt2,
            "umx" => Umx,
            "j2b" => J2b,
            "ptm" => Ptm,
            "ppm" => Ppm,
            "plm" => Plm,
            "sfx" => Sfx,
            "sfx2" => Sfx2,
            "nst" => Nst,
            "wow" => Wow,
            "ult" => Ult,
            "gdm" => Gdm,
            "mo3" => Mo3,
            "oxm" => Oxm,
            "rtm" => Rtm,
            "pt36" => Pt36,
            "m15" => M15,
            "stk" => Stk,
            "st26" => St26,
            "unic" => Unic,
            "ice" => Ice,
            "mmcmp" => Mmcmp,
            "xpk" => Xpk,
            "mms" => Mms,
            "cba" => Cba,
            "etx" => Etx,
            "fc" => Fc,
            "fc13" => Fc13,
            "fc14" => Fc14,
            "fst" => Fst,
            "ftm" => Ftm,
            "gmc" => Gmc,
            "gtk" => Gtk,
            "gt2" => Gt2,
            "puma" => Puma,
            "smod" => Smod,
            "symmod" => Symmod,
            "tcb" => Tcb,
            "xmf" => Xmf,

            _ => Unknown,
        }
    }

    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn is_pass_through(&self) -> bool {
        (0x01..=0x0F).contains(&self.code())
    }

    pub fn is_midi_style(&self) -> bool {
        (0x10..=0x1F).contains(&self.code())
    }

    pub fn is_native_opl(&self) -> bool {
        (0x20..=0x5F).contains(&self.code())
    }

    pub fn is_tracker(&self) -> bool {
        (0x60..=0xA0).contains(&self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_partitions() {
        assert!(SourceFormat::from_extension("vgz").is_pass_through());
        assert!(SourceFormat::from_extension("hmp").is_midi_style());
        assert!(SourceFormat::from_extension("rad").is_native_opl());
        assert!(SourceFormat::from_extension("it").is_tracker());
        assert_eq!(SourceFormat::from_extension("zzz"), SourceFormat::Unknown);
    }

    #[test]
    fn test_tracker_range_tail() {
        // The registry runs to the end of the tracker range
        for ext in [
            "etx", "fc", "fc13", "fc14", "fst", "ftm", "gmc", "gtk", "gt2", "puma", "smod",
            "symmod", "tcb", "xmf",
        ] {
            assert!(
                SourceFormat::from_extension(ext).is_tracker(),
                ".{} should be a tracker format",
                ext
            );
        }
        assert_eq!(SourceFormat::Xmf.code(), 0xA0);
    }

    #[test]
    fn test_shared_extension_aliases() {
        assert_eq!(SourceFormat::from_extension("wlf"), SourceFormat::Imf);
        assert_eq!(SourceFormat::from_extension("imf"), SourceFormat::Imf);
        assert!(SourceFormat::from_extension("mus").is_midi_style());
        assert!(SourceFormat::from_extension("dtm").is_native_opl());
    }

    #[test]
    fn test_codes_match_registry() {
        assert_eq!(SourceFormat::Hmp.code(), 0x15);
        assert_eq!(SourceFormat::Rad.code(), 0x20);
        assert_eq!(SourceFormat::Mod.code(), 0x60);
    }
}
