use crate::modules::perception::{Instrument, Market};

/// KOSPI 시총 상위 10 종목
pub const KOSPI_TOP_10: &[Instrument] = &[
    Instrument {
        code: "005930",
        name_ko: "삼성전자",
        name_en: "Samsung Electronics",
        sector: "전자/반도체",
        market: Market::Kospi,
        keywords_ko: &["삼성전자", "삼성 반도체", "삼성 갤럭시"],
        keywords_en: &["Samsung Electronics", "Samsung semiconductor", "Samsung Galaxy"],
    },
    Instrument {
        code: "000660",
        name_ko: "SK하이닉스",
        name_en: "SK Hynix",
        sector: "반도체",
        market: Market::Kospi,
        keywords_ko: &["SK하이닉스", "SK 하이닉스", "HBM"],
        keywords_en: &["SK Hynix", "SK Hynix HBM", "SK Hynix memory"],
    },
    Instrument {
        code: "373220",
        name_ko: "LG에너지솔루션",
        name_en: "LG Energy Solution",
        sector: "2차전지",
        market: Market::Kospi,
        keywords_ko: &["LG에너지솔루션", "LG 배터리"],
        keywords_en: &["LG Energy Solution", "LG battery"],
    },
    Instrument {
        code: "207940",
        name_ko: "삼성바이오로직스",
        name_en: "Samsung Biologics",
        sector: "바이오",
        market: Market::Kospi,
        keywords_ko: &["삼성바이오로직스", "삼성바이오"],
        keywords_en: &["Samsung Biologics"],
    },
    Instrument {
        code: "005380",
        name_ko: "현대차",
        name_en: "Hyundai Motor",
        sector: "자동차",
        market: Market::Kospi,
        keywords_ko: &["현대차", "현대자동차", "현대 전기차"],
        keywords_en: &["Hyundai Motor", "Hyundai EV"],
    },
    Instrument {
        code: "051910",
        name_ko: "LG화학",
        name_en: "LG Chem",
        sector: "화학/2차전지",
        market: Market::Kospi,
        keywords_ko: &["LG화학", "LG 화학"],
        keywords_en: &["LG Chem", "LG Chemical"],
    },
    Instrument {
        code: "006400",
        name_ko: "삼성SDI",
        name_en: "Samsung SDI",
        sector: "2차전지",
        market: Market::Kospi,
        keywords_ko: &["삼성SDI", "삼성 SDI", "삼성 배터리"],
        keywords_en: &["Samsung SDI", "Samsung battery"],
    },
    Instrument {
        code: "035420",
        name_ko: "NAVER",
        name_en: "Naver Corp",
        sector: "IT/플랫폼",
        market: Market::Kospi,
        keywords_ko: &["네이버", "NAVER", "네이버 AI"],
        keywords_en: &["Naver", "Naver Corp", "Naver AI"],
    },
    Instrument {
        code: "035720",
        name_ko: "카카오",
        name_en: "Kakao Corp",
        sector: "IT/플랫폼",
        market: Market::Kospi,
        keywords_ko: &["카카오", "Kakao", "카카오톡"],
        keywords_en: &["Kakao", "Kakao Corp", "KakaoTalk"],
    },
    Instrument {
        code: "028260",
        name_ko: "삼성물산",
        name_en: "Samsung C&T",
        sector: "건설/패션",
        market: Market::Kospi,
        keywords_ko: &["삼성물산", "삼성 물산"],
        keywords_en: &["Samsung C&T", "Samsung Construction"],
    },
];

pub const NASDAQ_TOP_10: &[Instrument] = &[
    Instrument {
        code: "AAPL",
        name_ko: "애플",
        name_en: "Apple",
        sector: "IT/하드웨어",
        market: Market::Nasdaq,
        keywords_ko: &["애플", "아이폰"],
        keywords_en: &["Apple stock", "Apple iPhone"],
    },
    Instrument {
        code: "MSFT",
        name_ko: "마이크로소프트",
        name_en: "Microsoft",
        sector: "소프트웨어",
        market: Market::Nasdaq,
        keywords_ko: &["마이크로소프트"],
        keywords_en: &["Microsoft stock", "Microsoft Azure"],
    },
    Instrument {
        code: "NVDA",
        name_ko: "엔비디아",
        name_en: "NVIDIA",
        sector: "반도체",
        market: Market::Nasdaq,
        keywords_ko: &["엔비디아"],
        keywords_en: &["NVIDIA stock", "NVIDIA GPU"],
    },
    Instrument {
        code: "AMZN",
        name_ko: "아마존",
        name_en: "Amazon",
        sector: "전자상거래/클라우드",
        market: Market::Nasdaq,
        keywords_ko: &["아마존"],
        keywords_en: &["Amazon stock", "AWS"],
    },
    Instrument {
        code: "GOOGL",
        name_ko: "알파벳",
        name_en: "Alphabet",
        sector: "IT/플랫폼",
        market: Market::Nasdaq,
        keywords_ko: &["구글", "알파벳"],
        keywords_en: &["Alphabet Google stock", "Google AI"],
    },
    Instrument {
        code: "META",
        name_ko: "메타",
        name_en: "Meta Platforms",
        sector: "IT/플랫폼",
        market: Market::Nasdaq,
        keywords_ko: &["메타 플랫폼스"],
        keywords_en: &["Meta Platforms stock", "Meta AI"],
    },
    Instrument {
        code: "TSLA",
        name_ko: "테슬라",
        name_en: "Tesla",
        sector: "자동차/전기차",
        market: Market::Nasdaq,
        keywords_ko: &["테슬라"],
        keywords_en: &["Tesla stock", "Tesla EV"],
    },
    Instrument {
        code: "AVGO",
        name_ko: "브로드컴",
        name_en: "Broadcom",
        sector: "반도체",
        market: Market::Nasdaq,
        keywords_ko: &["브로드컴"],
        keywords_en: &["Broadcom stock"],
    },
    Instrument {
        code: "COST",
        name_ko: "코스트코",
        name_en: "Costco",
        sector: "유통",
        market: Market::Nasdaq,
        keywords_ko: &["코스트코"],
        keywords_en: &["Costco stock"],
    },
    Instrument {
        code: "NFLX",
        name_ko: "넷플릭스",
        name_en: "Netflix",
        sector: "미디어",
        market: Market::Nasdaq,
        keywords_ko: &["넷플릭스"],
        keywords_en: &["Netflix stock"],
    },
];

/// 抓取阶段按这个顺序遍历：先 KOSPI 再 NASDAQ
pub fn all_instruments() -> impl Iterator<Item = &'static Instrument> {
    KOSPI_TOP_10.iter().chain(NASDAQ_TOP_10.iter())
}
