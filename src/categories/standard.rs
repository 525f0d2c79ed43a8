use std::fmt;

use crate::util::fold_lowercase;

/// The fixed set of topical categories articles are filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardCategory {
    Spor,
    Ekonomi,
    Siyaset,
    Teknoloji,
    Saglik,
    Egitim,
    KulturSanat,
    Yasam,
    Gundem,
    Dunya,
    Magazin,
    Bilim,
    Otomobil,
    Yerel,
    Asayis,
    Cevre,
    Turizm,
    Gida,
    Emlak,
    Hukuk,
    Diger,
}

impl StandardCategory {
    /// Category used when nothing else fits ("Other").
    pub const FALLBACK: StandardCategory = StandardCategory::Diger;

    pub const ALL: [StandardCategory; 21] = [
        Self::Spor,
        Self::Ekonomi,
        Self::Siyaset,
        Self::Teknoloji,
        Self::Saglik,
        Self::Egitim,
        Self::KulturSanat,
        Self::Yasam,
        Self::Gundem,
        Self::Dunya,
        Self::Magazin,
        Self::Bilim,
        Self::Otomobil,
        Self::Yerel,
        Self::Asayis,
        Self::Cevre,
        Self::Turizm,
        Self::Gida,
        Self::Emlak,
        Self::Hukuk,
        Self::Diger,
    ];

    /// Display name as stored in the `categories` table.
    pub fn name(self) -> &'static str {
        match self {
            Self::Spor => "Spor",
            Self::Ekonomi => "Ekonomi",
            Self::Siyaset => "Siyaset",
            Self::Teknoloji => "Teknoloji",
            Self::Saglik => "Sağlık",
            Self::Egitim => "Eğitim",
            Self::KulturSanat => "Kültür-Sanat",
            Self::Yasam => "Yaşam",
            Self::Gundem => "Gündem",
            Self::Dunya => "Dünya",
            Self::Magazin => "Magazin",
            Self::Bilim => "Bilim",
            Self::Otomobil => "Otomobil",
            Self::Yerel => "Yerel",
            Self::Asayis => "Asayiş",
            Self::Cevre => "Çevre",
            Self::Turizm => "Turizm",
            Self::Gida => "Gıda",
            Self::Emlak => "Emlak",
            Self::Hukuk => "Hukuk",
            Self::Diger => "Diğer",
        }
    }

    /// Looks a standard name up, ignoring case and surrounding whitespace/quotes.
    ///
    /// Model replies sometimes come back as `"spor"` or `Spor.`; anything that
    /// isn't one of the 21 names yields `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        let cleaned = name
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '.' || c == '`')
            .trim();
        // Dotless ı is compared as i so that ASCII-capitalised "SAĞLIK" matches.
        let skeleton = |s: &str| fold_lowercase(s).replace('ı', "i");
        let wanted = skeleton(cleaned);
        Self::ALL.into_iter().find(|c| skeleton(c.name()) == wanted)
    }
}

impl fmt::Display for StandardCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lowercase synonym → category rules, checked in this order.
pub const CATEGORY_RULES: &[(&str, StandardCategory)] = {
    use StandardCategory::*;
    &[
        ("spor", Spor),
        ("futbol", Spor),
        ("basketbol", Spor),
        ("voleybol", Spor),
        ("fikstur", Spor),
        ("fikstür", Spor),
        ("transfer", Spor),
        ("şampiyonlar ligi", Spor),
        ("ekonomi", Ekonomi),
        ("borsa", Ekonomi),
        ("döviz", Ekonomi),
        ("piyasa", Ekonomi),
        ("finans", Ekonomi),
        ("iş", Ekonomi),
        ("ticaret", Ekonomi),
        ("siyaset", Siyaset),
        ("politika", Siyaset),
        ("seçim", Siyaset),
        ("meclis", Siyaset),
        ("teknoloji", Teknoloji),
        ("bilim teknoloji", Teknoloji),
        ("yazılım", Teknoloji),
        ("donanım", Teknoloji),
        ("internet", Teknoloji),
        ("oyun", Teknoloji),
        ("sağlık", Saglik),
        ("hastane", Saglik),
        ("doktor", Saglik),
        ("tıp", Saglik),
        ("covid", Saglik),
        ("pandemi", Saglik),
        ("eğitim", Egitim),
        ("okul", Egitim),
        ("üniversite", Egitim),
        ("öğrenci", Egitim),
        ("sınav", Egitim),
        ("yks", Egitim),
        ("lgs", Egitim),
        ("kültür", KulturSanat),
        ("sanat", KulturSanat),
        ("kültür sanat", KulturSanat),
        ("sinema", KulturSanat),
        ("tiyatro", KulturSanat),
        ("müzik", KulturSanat),
        ("konser", KulturSanat),
        ("sergi", KulturSanat),
        ("yaşam", Yasam),
        ("hayat", Yasam),
        ("lifestyle", Yasam),
        ("kadın", Yasam),
        ("erkek", Yasam),
        ("moda", Yasam),
        ("güzellik", Yasam),
        ("gündem", Gundem),
        ("güncel", Gundem),
        ("son dakika", Gundem),
        ("genel", Gundem),
        ("haber", Gundem),
        ("haberler", Gundem),
        ("gaziantep", Yerel),
        ("gaziantep haber", Yerel),
        ("şehitkamil", Yerel),
        ("şahinbey", Yerel),
        ("istanbul", Yerel),
        ("ankara", Yerel),
        ("izmir", Yerel),
        ("yerel", Yerel),
        ("kent", Yerel),
        ("asayiş", Asayis),
        ("polis", Asayis),
        ("güvenlik", Asayis),
        ("adliye", Asayis),
        ("kaza", Asayis),
        ("bilim", Bilim),
        ("araştırma", Bilim),
        ("uzay", Bilim),
        ("keşif", Bilim),
        ("magazin", Magazin),
        ("ünlü", Magazin),
        ("dedikodu", Magazin),
        ("dünya", Dunya),
        ("uluslararası", Dunya),
        ("avrupa", Dunya),
        ("amerika", Dunya),
        ("asya", Dunya),
        ("otomobil", Otomobil),
        ("otomotiv", Otomobil),
        ("araba", Otomobil),
        ("motor", Otomobil),
        ("hayvanlar alemi", Cevre),
        ("hayvan", Cevre),
        ("doğa", Cevre),
        ("çevre", Cevre),
        ("turizm", Turizm),
        ("tatil", Turizm),
        ("gezi", Turizm),
        ("seyahat", Turizm),
    ]
};

/// Instructions shared by the single-label and batch classification prompts.
pub(crate) fn classification_preamble() -> String {
    let names: Vec<&str> = StandardCategory::ALL.iter().map(|c| c.name()).collect();
    format!(
        "Sen bir haber kategori uzmanısın. Sana verilen kategori listesini aşağıdaki \
standart kategorilerden uygun olanlarla eşleştir.\n\n\
Standart Kategoriler:\n{}\n\n\
Kurallar:\n\
1. Her kategoriyi sadece BİR standart kategori ile eşleştir\n\
2. Eğer hiçbir kategori uymuyorsa \"{}\" kategorisini kullan\n\
3. Büyük/küçük harf farkını göz ardı et\n\
4. Benzer anlamdaki kelimeleri aynı kategoriye eşleştir (örn: \"FİKSTÜR\" -> \"Spor\")\n\
5. Şehir isimleri \"Yerel\" kategorisine gider\n\
6. Sadece istenen formatta yanıt ver\n\n\
Örnek Girdi: [\"SPOR\", \"Gaziantep Haber\", \"FİKSTÜR\", \"EKONOMİ\"]\n\
Örnek Çıktı: {{\"SPOR\": \"Spor\", \"Gaziantep Haber\": \"Yerel\", \"FİKSTÜR\": \"Spor\", \"EKONOMİ\": \"Ekonomi\"}}\n",
        names.join(", "),
        StandardCategory::FALLBACK.name()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_all_names_unique() {
        let names: HashSet<&str> = StandardCategory::ALL.iter().map(|c| c.name()).collect();
        assert_eq!(names.len(), 21);
    }

    #[test]
    fn test_from_name_is_lenient() {
        assert_eq!(StandardCategory::from_name("Spor"), Some(StandardCategory::Spor));
        assert_eq!(StandardCategory::from_name(" \"spor\"\n"), Some(StandardCategory::Spor));
        assert_eq!(StandardCategory::from_name("SAĞLIK"), Some(StandardCategory::Saglik));
        assert_eq!(StandardCategory::from_name("EĞİTİM."), Some(StandardCategory::Egitim));
        assert_eq!(
            StandardCategory::from_name("kültür-sanat"),
            Some(StandardCategory::KulturSanat)
        );
        assert_eq!(StandardCategory::from_name("Festival"), None);
    }

    #[test]
    fn test_rule_keys_are_lowercase_and_unique() {
        let mut seen = HashSet::new();
        for (key, _) in CATEGORY_RULES {
            assert_eq!(fold_lowercase(key), *key, "rule key not lowercase: {key}");
            assert!(seen.insert(*key), "duplicate rule key: {key}");
        }
    }

    #[test]
    fn test_preamble_lists_every_category() {
        let prompt = classification_preamble();
        for category in StandardCategory::ALL {
            assert!(prompt.contains(category.name()));
        }
    }
}
