//! Element kinds and their reference-attribute schema.
//!
//! Every tag the document model understands maps to an [`ElementKind`]. The
//! kind decides three things the linker cares about:
//!
//! - which attribute holds the element's key ([`ElementKind::key_attribute`]),
//! - which scope indexes the element ([`ElementKind::index_scope`]),
//! - which attributes name other elements ([`ElementKind::references`]).
//!
//! Attributes not listed here are carried as opaque literals.

use std::fmt;

/// The kind of a base container holding reusable definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BaseKind {
    Connector,
    Descriptor,
    Region,
    Rule,
    Transition,
}

impl BaseKind {
    /// Returns the element kind of the base container itself.
    pub fn base_element(self) -> ElementKind {
        match self {
            BaseKind::Connector => ElementKind::ConnectorBase,
            BaseKind::Descriptor => ElementKind::DescriptorBase,
            BaseKind::Region => ElementKind::RegionBase,
            BaseKind::Rule => ElementKind::RuleBase,
            BaseKind::Transition => ElementKind::TransitionBase,
        }
    }
}

impl fmt::Display for BaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BaseKind::Connector => "connector",
            BaseKind::Descriptor => "descriptor",
            BaseKind::Region => "region",
            BaseKind::Rule => "rule",
            BaseKind::Transition => "transition",
        };
        write!(f, "{name}")
    }
}

/// The scope in which an element registers its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexScope {
    /// The definitions table of the nearest enclosing base of this kind.
    Definition(BaseKind),
    /// The node table of the nearest enclosing composite, plus the
    /// document-wide node index.
    Node,
    /// The interface table of the nearest enclosing node.
    Interface,
    /// The link table of the nearest enclosing composite.
    Link,
    /// The role table of the enclosing connector.
    Role,
    /// The parameter table of the enclosing connector.
    Parameter,
}

/// The kind of element a reference attribute expects to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    /// A definition held by a base (connector, descriptor, region, rule, transition).
    Definition(BaseKind),
    /// A node visible from the referrer's composite, searched outward.
    Node,
    /// Any node of the document, used for node reuse (`refer`).
    ReusedNode,
    /// An anchor, property or port of the element named by the sibling
    /// `component` attribute.
    Interface,
    /// A role of the connector used by the enclosing link.
    Role,
    /// A connector parameter, either of the enclosing connector (`$name`) or
    /// of the connector used by the enclosing link.
    Parameter,
    /// A member of the enclosing switch: one of its nodes for a `switch`,
    /// one of its descriptors for a `descriptorSwitch`. Used by `bindRule`
    /// constituents and by the switch defaults.
    Constituent,
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefKind::Definition(base) => write!(f, "{base}"),
            RefKind::Node => write!(f, "node"),
            RefKind::ReusedNode => write!(f, "reused node"),
            RefKind::Interface => write!(f, "interface"),
            RefKind::Role => write!(f, "role"),
            RefKind::Parameter => write!(f, "connector parameter"),
            RefKind::Constituent => write!(f, "constituent"),
        }
    }
}

/// A reference attribute declared by an element kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefAttr {
    pub name: &'static str,
    pub kind: RefKind,
}

const fn attr(name: &'static str, kind: RefKind) -> RefAttr {
    RefAttr { name, kind }
}

/// Attributes of connector statements whose value may be a `$parameter`.
pub const PARAMETER_ATTRIBUTES: &[&str] = &[
    "delay",
    "value",
    "duration",
    "repeat",
    "repeatDelay",
    "by",
    "key",
    "offset",
    "max",
    "min",
];

// Order matters: slots that depend on another slot come after it.
const NO_REFS: &[RefAttr] = &[];
const REFER: &[RefAttr] = &[attr("refer", RefKind::ReusedNode)];
const MEDIA: &[RefAttr] = &[
    attr("descriptor", RefKind::Definition(BaseKind::Descriptor)),
    attr("refer", RefKind::ReusedNode),
];
const COMPONENT_INTERFACE: &[RefAttr] = &[
    attr("component", RefKind::Node),
    attr("interface", RefKind::Interface),
];
const LINK: &[RefAttr] = &[attr("xconnector", RefKind::Definition(BaseKind::Connector))];
const BIND: &[RefAttr] = &[
    attr("role", RefKind::Role),
    attr("component", RefKind::Node),
    attr("interface", RefKind::Interface),
    attr("descriptor", RefKind::Definition(BaseKind::Descriptor)),
];
const CONNECTOR_PARAM_NAME: &[RefAttr] = &[attr("name", RefKind::Parameter)];
const DEFAULT_COMPONENT: &[RefAttr] = &[attr("component", RefKind::Constituent)];
const BIND_RULE: &[RefAttr] = &[
    attr("constituent", RefKind::Constituent),
    attr("rule", RefKind::Definition(BaseKind::Rule)),
];
const DESCRIPTOR: &[RefAttr] = &[
    attr("region", RefKind::Definition(BaseKind::Region)),
    attr("transIn", RefKind::Definition(BaseKind::Transition)),
    attr("transOut", RefKind::Definition(BaseKind::Transition)),
];
const DEFAULT_DESCRIPTOR: &[RefAttr] = &[attr("descriptor", RefKind::Constituent)];
const IMPORT_BASE: &[RefAttr] = &[attr("region", RefKind::Definition(BaseKind::Region))];

/// Every element kind known to the document model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Ncl,
    Head,
    Body,
    Context,
    Switch,
    Media,
    Port,
    Area,
    Property,
    SwitchPort,
    Mapping,
    Link,
    Bind,
    LinkParam,
    BindParam,
    DefaultComponent,
    BindRule,
    ConnectorBase,
    CausalConnector,
    ConnectorParam,
    SimpleCondition,
    CompoundCondition,
    SimpleAction,
    CompoundAction,
    AttributeAssessment,
    ValueAssessment,
    AssessmentStatement,
    CompoundStatement,
    DescriptorBase,
    Descriptor,
    DescriptorSwitch,
    DefaultDescriptor,
    DescriptorParam,
    RegionBase,
    Region,
    RuleBase,
    Rule,
    CompositeRule,
    TransitionBase,
    Transition,
    ImportBase,
    ImportedDocumentBase,
    ImportNcl,
    Meta,
    Metadata,
}

impl ElementKind {
    /// All element kinds, in declaration order.
    pub const ALL: &'static [ElementKind] = &[
        ElementKind::Ncl,
        ElementKind::Head,
        ElementKind::Body,
        ElementKind::Context,
        ElementKind::Switch,
        ElementKind::Media,
        ElementKind::Port,
        ElementKind::Area,
        ElementKind::Property,
        ElementKind::SwitchPort,
        ElementKind::Mapping,
        ElementKind::Link,
        ElementKind::Bind,
        ElementKind::LinkParam,
        ElementKind::BindParam,
        ElementKind::DefaultComponent,
        ElementKind::BindRule,
        ElementKind::ConnectorBase,
        ElementKind::CausalConnector,
        ElementKind::ConnectorParam,
        ElementKind::SimpleCondition,
        ElementKind::CompoundCondition,
        ElementKind::SimpleAction,
        ElementKind::CompoundAction,
        ElementKind::AttributeAssessment,
        ElementKind::ValueAssessment,
        ElementKind::AssessmentStatement,
        ElementKind::CompoundStatement,
        ElementKind::DescriptorBase,
        ElementKind::Descriptor,
        ElementKind::DescriptorSwitch,
        ElementKind::DefaultDescriptor,
        ElementKind::DescriptorParam,
        ElementKind::RegionBase,
        ElementKind::Region,
        ElementKind::RuleBase,
        ElementKind::Rule,
        ElementKind::CompositeRule,
        ElementKind::TransitionBase,
        ElementKind::Transition,
        ElementKind::ImportBase,
        ElementKind::ImportedDocumentBase,
        ElementKind::ImportNcl,
        ElementKind::Meta,
        ElementKind::Metadata,
    ];

    /// Returns the tag name used in the textual form.
    pub fn tag(self) -> &'static str {
        match self {
            ElementKind::Ncl => "ncl",
            ElementKind::Head => "head",
            ElementKind::Body => "body",
            ElementKind::Context => "context",
            ElementKind::Switch => "switch",
            ElementKind::Media => "media",
            ElementKind::Port => "port",
            ElementKind::Area => "area",
            ElementKind::Property => "property",
            ElementKind::SwitchPort => "switchPort",
            ElementKind::Mapping => "mapping",
            ElementKind::Link => "link",
            ElementKind::Bind => "bind",
            ElementKind::LinkParam => "linkParam",
            ElementKind::BindParam => "bindParam",
            ElementKind::DefaultComponent => "defaultComponent",
            ElementKind::BindRule => "bindRule",
            ElementKind::ConnectorBase => "connectorBase",
            ElementKind::CausalConnector => "causalConnector",
            ElementKind::ConnectorParam => "connectorParam",
            ElementKind::SimpleCondition => "simpleCondition",
            ElementKind::CompoundCondition => "compoundCondition",
            ElementKind::SimpleAction => "simpleAction",
            ElementKind::CompoundAction => "compoundAction",
            ElementKind::AttributeAssessment => "attributeAssessment",
            ElementKind::ValueAssessment => "valueAssessment",
            ElementKind::AssessmentStatement => "assessmentStatement",
            ElementKind::CompoundStatement => "compoundStatement",
            ElementKind::DescriptorBase => "descriptorBase",
            ElementKind::Descriptor => "descriptor",
            ElementKind::DescriptorSwitch => "descriptorSwitch",
            ElementKind::DefaultDescriptor => "defaultDescriptor",
            ElementKind::DescriptorParam => "descriptorParam",
            ElementKind::RegionBase => "regionBase",
            ElementKind::Region => "region",
            ElementKind::RuleBase => "ruleBase",
            ElementKind::Rule => "rule",
            ElementKind::CompositeRule => "compositeRule",
            ElementKind::TransitionBase => "transitionBase",
            ElementKind::Transition => "transition",
            ElementKind::ImportBase => "importBase",
            ElementKind::ImportedDocumentBase => "importedDocumentBase",
            ElementKind::ImportNcl => "importNCL",
            ElementKind::Meta => "meta",
            ElementKind::Metadata => "metadata",
        }
    }

    /// Looks up the element kind for a tag name.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.tag() == tag)
    }

    /// Returns the base kind if this element is a base container.
    pub fn as_base(self) -> Option<BaseKind> {
        match self {
            ElementKind::ConnectorBase => Some(BaseKind::Connector),
            ElementKind::DescriptorBase => Some(BaseKind::Descriptor),
            ElementKind::RegionBase => Some(BaseKind::Region),
            ElementKind::RuleBase => Some(BaseKind::Rule),
            ElementKind::TransitionBase => Some(BaseKind::Transition),
            _ => None,
        }
    }

    /// Composite nodes own a node table and a link table.
    pub fn is_composite(self) -> bool {
        matches!(
            self,
            ElementKind::Body | ElementKind::Context | ElementKind::Switch
        )
    }

    /// Nodes own an interface table.
    pub fn is_node(self) -> bool {
        matches!(
            self,
            ElementKind::Body | ElementKind::Context | ElementKind::Switch | ElementKind::Media
        )
    }

    /// Connectors own a role table and a parameter table.
    pub fn is_connector(self) -> bool {
        self == ElementKind::CausalConnector
    }

    /// Import elements bind an alias to an external document.
    pub fn is_import(self) -> bool {
        matches!(self, ElementKind::ImportBase | ElementKind::ImportNcl)
    }

    /// Statements inside a connector may use `$parameter` values.
    pub fn accepts_parameters(self) -> bool {
        matches!(
            self,
            ElementKind::SimpleCondition
                | ElementKind::CompoundCondition
                | ElementKind::SimpleAction
                | ElementKind::CompoundAction
                | ElementKind::AttributeAssessment
                | ElementKind::ValueAssessment
                | ElementKind::AssessmentStatement
                | ElementKind::CompoundStatement
        )
    }

    /// Returns the attribute holding this element's key, if it has one.
    pub fn key_attribute(self) -> Option<&'static str> {
        match self {
            ElementKind::SimpleCondition
            | ElementKind::SimpleAction
            | ElementKind::AttributeAssessment => Some("role"),
            ElementKind::ConnectorParam => Some("name"),
            ElementKind::LinkParam
            | ElementKind::BindParam
            | ElementKind::Bind
            | ElementKind::BindRule
            | ElementKind::DefaultComponent
            | ElementKind::DefaultDescriptor
            | ElementKind::DescriptorParam
            | ElementKind::Mapping
            | ElementKind::ImportBase
            | ElementKind::ImportNcl
            | ElementKind::ImportedDocumentBase
            | ElementKind::Meta
            | ElementKind::Metadata => None,
            _ => Some("id"),
        }
    }

    /// Returns the scope this element registers its key in.
    pub fn index_scope(self) -> Option<IndexScope> {
        match self {
            ElementKind::Context | ElementKind::Switch | ElementKind::Media => {
                Some(IndexScope::Node)
            }
            ElementKind::Port
            | ElementKind::Area
            | ElementKind::Property
            | ElementKind::SwitchPort => Some(IndexScope::Interface),
            ElementKind::Link => Some(IndexScope::Link),
            ElementKind::SimpleCondition
            | ElementKind::SimpleAction
            | ElementKind::AttributeAssessment => Some(IndexScope::Role),
            ElementKind::ConnectorParam => Some(IndexScope::Parameter),
            ElementKind::CausalConnector => Some(IndexScope::Definition(BaseKind::Connector)),
            ElementKind::Descriptor | ElementKind::DescriptorSwitch => {
                Some(IndexScope::Definition(BaseKind::Descriptor))
            }
            ElementKind::Region => Some(IndexScope::Definition(BaseKind::Region)),
            ElementKind::Rule | ElementKind::CompositeRule => {
                Some(IndexScope::Definition(BaseKind::Rule))
            }
            ElementKind::Transition => Some(IndexScope::Definition(BaseKind::Transition)),
            _ => None,
        }
    }

    /// Returns the reference attributes of this kind, dependencies first.
    pub fn references(self) -> &'static [RefAttr] {
        match self {
            ElementKind::Context | ElementKind::Switch => REFER,
            ElementKind::Media => MEDIA,
            ElementKind::Port | ElementKind::Mapping => COMPONENT_INTERFACE,
            ElementKind::Link => LINK,
            ElementKind::Bind => BIND,
            ElementKind::LinkParam | ElementKind::BindParam => CONNECTOR_PARAM_NAME,
            ElementKind::DefaultComponent => DEFAULT_COMPONENT,
            ElementKind::BindRule => BIND_RULE,
            ElementKind::Descriptor => DESCRIPTOR,
            ElementKind::DefaultDescriptor => DEFAULT_DESCRIPTOR,
            ElementKind::ImportBase => IMPORT_BASE,
            _ => NO_REFS,
        }
    }

    /// Returns the declared reference attribute named `name`, if any.
    pub fn reference(self, name: &str) -> Option<RefAttr> {
        self.references().iter().copied().find(|r| r.name == name)
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}
