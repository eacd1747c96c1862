//! Built-in domain tables.
//!
//! `{term}` in a relation pattern expands to a CJK/alphanumeric span capture
//! and `{en}` to a short English phrase capture (up to three words).
//! Tool patterns carry no `\b`; matches are boundary-checked by callers with
//! [`crate::text::ascii_bounded`] so that CJK neighbours do not block them.

pub const REGISTRY_VERSION: &str = "2024.2";

pub struct DomainTable {
    pub name: &'static str,
    pub core_terms: &'static [(&'static str, f64)],
    pub tool_patterns: &'static [&'static str],
    pub concept_patterns: &'static [(&'static str, &'static str)],
    pub relation_patterns: &'static [(&'static str, &'static str, f64)],
    pub categories: &'static [&'static str],
}

pub const GENERAL: DomainTable = DomainTable {
    name: "general",
    core_terms: &[
        ("系统", 1.5),
        ("管理", 1.5),
        ("分析", 1.5),
        ("优化", 1.5),
        ("数据", 1.5),
        ("技术", 1.5),
        ("平台", 1.5),
        ("策略", 1.5),
        ("system", 1.5),
        ("management", 1.5),
        ("analysis", 1.5),
        ("optimization", 1.5),
        ("strategy", 1.5),
    ],
    tool_patterns: &[
        r"(?:Python|JavaScript|TypeScript|Java|Rust|Excel|SQL|Docker|Kubernetes|Git|Linux)",
    ],
    concept_patterns: &[
        (r"(?:信息|管理|推荐|决策|评价)系统", "professional_term"),
        (r"(?:数据|需求|竞品|风险)分析", "professional_term"),
    ],
    relation_patterns: &[],
    categories: &[],
};

pub const MARKETING: DomainTable = DomainTable {
    name: "marketing",
    core_terms: &[
        ("ROI", 3.0),
        ("转化率", 3.0),
        ("数字营销", 2.5),
        ("内容营销", 2.5),
        ("用户画像", 2.5),
        ("获客成本", 2.5),
        ("私域流量", 2.5),
        ("用户增长", 2.5),
        ("营销漏斗", 2.5),
        ("客户生命周期", 2.5),
        ("品牌", 2.0),
        ("流量", 2.0),
        ("社交媒体", 2.0),
        ("SEO", 2.5),
        ("CTR", 2.5),
        ("KPI", 2.0),
        ("conversion rate", 3.0),
        ("digital marketing", 2.5),
        ("content marketing", 2.5),
        ("customer acquisition", 2.5),
        ("user persona", 2.5),
    ],
    tool_patterns: &[
        r"(?:Google Analytics|Google Ads|HubSpot|Salesforce|Mailchimp|SEMrush|Hootsuite)",
        r"(?:微信公众号|小红书|抖音|微博|企业微信)",
    ],
    concept_patterns: &[
        (r"(?:社交|搜索引擎|内容|数字|精准|病毒|口碑|全渠道|整合|社群)营销", "business_concept"),
        (r"(?:点击|跳出|留存|复购|转化)率", "professional_term"),
        (r"(?:A/B测试|漏斗分析|归因模型|用户分群)", "professional_term"),
    ],
    relation_patterns: &[
        (r"通过{term}(?:提升|提高){term}", "improves", 0.9),
        (r"{term}(?:驱动|带动){term}", "drives", 0.8),
        (r"{en} (?:drives|boosts) {en}", "drives", 0.8),
    ],
    categories: &["business_concept"],
};

pub const TECHNOLOGY: DomainTable = DomainTable {
    name: "technology",
    core_terms: &[
        ("人工智能", 3.0),
        ("机器学习", 3.0),
        ("深度学习", 3.0),
        ("大数据", 2.5),
        ("云计算", 2.5),
        ("微服务", 2.5),
        ("神经网络", 2.5),
        ("算法", 2.0),
        ("架构", 2.0),
        ("数据库", 2.0),
        ("API", 2.0),
        ("AI", 3.0),
        ("machine learning", 3.0),
        ("deep learning", 3.0),
        ("neural network", 2.5),
        ("microservice", 2.5),
        ("database", 2.0),
    ],
    tool_patterns: &[
        r"(?:TensorFlow|PyTorch|Kubernetes|Docker|Redis|PostgreSQL|MySQL|MongoDB|Kafka|Spark|Hadoop|React|Vue|Node\.js)",
    ],
    concept_patterns: &[
        (r"(?:机器|深度|强化|迁移|联邦)学习", "professional_term"),
        (r"(?:神经|卷积|循环|对抗)网络", "professional_term"),
        (r"(?:分布式|微服务|事件驱动|分层)架构", "technical_concept"),
        (r"(?:自然语言处理|计算机视觉|知识图谱|推荐算法)", "technical_concept"),
    ],
    relation_patterns: &[
        (r"{term}(?:部署在|运行在|运行于){term}", "deployed_on", 0.8),
        (r"{term}(?:调用|依赖于){term}", "depends_on", 0.8),
        (r"{en} (?:runs on|is deployed on) {en}", "deployed_on", 0.8),
    ],
    categories: &["technical_concept"],
};

pub const BUSINESS: DomainTable = DomainTable {
    name: "business",
    core_terms: &[
        ("商业模式", 3.0),
        ("供应链", 2.5),
        ("市场份额", 2.5),
        ("现金流", 2.5),
        ("利润率", 2.5),
        ("竞争优势", 2.5),
        ("客户价值", 2.5),
        ("运营效率", 2.5),
        ("business model", 3.0),
        ("supply chain", 2.5),
        ("market share", 2.5),
        ("cash flow", 2.5),
    ],
    tool_patterns: &[r"(?:SAP|Oracle ERP|Tableau|Power BI|Jira|Notion)"],
    concept_patterns: &[
        (r"(?:商业|盈利|运营|管理|组织)模式", "business_concept"),
        (r"(?:战略|财务|风险|绩效)管理", "professional_term"),
    ],
    relation_patterns: &[
        (r"{term}(?:降低|减少){term}", "reduces", 0.8),
        (r"{en} (?:reduces|lowers) {en}", "reduces", 0.8),
    ],
    categories: &["business_concept"],
};

pub const BUILTIN_DOMAINS: &[&DomainTable] = &[&GENERAL, &MARKETING, &TECHNOLOGY, &BUSINESS];
