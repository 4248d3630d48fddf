use std::path::Path;
use std::sync::Once;
use tracing_subscriber::EnvFilter;
use xml_config::{Document, Error, Item, Node, NodeType, Position};

const CLAIMS_RETRIEVER: &str = "org.wso2.carbon.apimgt.impl.token.DefaultClaimsRetriever";

static LOGGING: Once = Once::new();

// Operator decisions are logged at debug level; RUST_LOG overrides the filter.
fn init_logging() {
    LOGGING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("xml_config=debug"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .unwrap_or_else(|e| eprintln!("Failed to set up logging: {}", e));
    });
}

fn api_manager() -> Document {
    init_logging();
    Document::parse_file(Path::new("tests/documents/api-manager.xml")).unwrap()
}

fn comments() -> Document {
    init_logging();
    Document::parse_file(Path::new("tests/documents/comments.xml")).unwrap()
}

// (type, name, text) of each child, to compare sibling lists before and after a change.
fn siblings(doc: &Document, path: &str) -> Vec<(NodeType, String, String)> {
    let parent = doc.select(path).unwrap()[0];
    parent
        .children(doc)
        .iter()
        .map(|child| {
            (
                child.node_type(doc),
                child.name(doc).to_string(),
                child.text_content(doc),
            )
        })
        .collect()
}

fn position_of(doc: &Document, path: &str) -> usize {
    doc.select(path).unwrap()[0].index_in_parent(doc).unwrap()
}

#[test]
fn exists() {
    let mut doc = api_manager();
    let operator = doc.operator();
    assert!(operator.config_exists("//DataSourceName").unwrap());
    assert!(operator.config_exists("/APIManager/AuthManager/Username").unwrap());
    assert!(!operator.config_exists("//DataSourceNames").unwrap());
    // names are case sensitive
    assert!(!operator.config_exists("//dataSourceName").unwrap());
}

#[test]
fn exists_comment() {
    let mut doc = api_manager();
    let operator = doc.operator();
    assert!(operator
        .config_exists("//APIConsumerAuthentication/comment()[contains(., 'ClaimsRetrieverImplClass')]")
        .unwrap());
    assert!(operator
        .config_exists(
            "//APIConsumerAuthentication/comment()[contains(., 'ConsumerDialectURI>http://wso2.org/claims</ConsumerDialectURI')]"
        )
        .unwrap());
}

#[test]
fn invalid_expression() {
    let mut doc = api_manager();
    let new = doc.build_config("Username", "admin", Vec::<(&str, &str)>::new());
    let mut operator = doc.operator();
    let results = vec![
        operator.config_exists("\\").map(|_| ()),
        operator.get_config("\\").map(|_| ()),
        operator.update_config("\\", new).map(|_| ()),
        operator.add_config("\\", new, Position::At).map(|_| ()),
        operator.remove_config("\\").map(|_| ()),
    ];
    for result in results {
        let err = result.unwrap_err();
        assert!(matches!(err, Error::Query { .. }));
        assert_eq!(err.to_string(), "XPath expression '\\' evaluation error");
    }
    assert!(!new.has_parent(&doc));
}

#[test]
fn get() {
    let mut doc = api_manager();
    let operator = doc.operator();
    for path in ["//APIConsumerAuthentication/SecurityContextHeader", "//SecurityContextHeader"].iter() {
        let config = operator.get_config(path).unwrap().unwrap();
        let doc = operator.document();
        assert_eq!(config.name(doc), "SecurityContextHeader");
        assert_eq!(config.text_content(doc), "X-JWT-Assertion");
    }
    assert_eq!(operator.get_config("//SecurityContextHeaders").unwrap(), None);

    let environment = operator.get_config("//Environment[@type='hybrid']").unwrap().unwrap();
    let environment = environment.node().unwrap();
    assert_eq!(environment.attribute(operator.document(), "api-console"), Some("true"));
}

#[test]
fn exists_attribute() {
    let mut doc = api_manager();
    let operator = doc.operator();
    assert!(operator.config_exists("//Environment/@api-console").unwrap());
    assert!(operator.config_exists("//Environment[@type='hybrid']/@type").unwrap());
    assert!(!operator.config_exists("//Environment/@missing").unwrap());
    assert!(!operator.config_exists("//AuthManager/@type").unwrap());
}

#[test]
fn get_attribute() {
    let mut doc = api_manager();
    let operator = doc.operator();
    let console = operator.get_config("//Environment/@api-console").unwrap().unwrap();
    let doc = operator.document();
    assert!(console.is_attribute());
    assert_eq!(console.node(), None);
    assert_eq!(console.name(doc), "api-console");
    assert_eq!(console.text_content(doc), "true");
    assert_eq!(doc.config(console).value(), "true");
    assert_eq!(operator.get_config("//Environment/@missing").unwrap(), None);
}

#[test]
fn update_add_remove_attribute() {
    let mut doc = api_manager();
    let before = doc.write_str().unwrap();
    let new = doc.build_config("api-console", "false", Vec::<(&str, &str)>::new());
    let mut operator = doc.operator();
    let path = "//Environment/@api-console";
    assert!(!operator.update_config(path, new).unwrap());
    for position in [Position::Before, Position::At, Position::After].iter() {
        assert!(!operator.add_config(path, new, *position).unwrap());
    }
    assert!(!operator.remove_config(path).unwrap());
    assert!(!operator.remove_config("//Environment/@type").unwrap());
    assert!(!new.has_parent(&doc));
    assert_eq!(doc.write_str().unwrap(), before);
}

#[test]
fn get_root() {
    let mut doc = api_manager();
    let operator = doc.operator();
    let root = operator.get_config("/").unwrap().unwrap();
    assert_eq!(root.name(operator.document()), "APIManager");

    let mut doc = comments();
    let operator = doc.operator();
    let first = operator.get_config("/").unwrap().unwrap();
    assert_eq!(first.node_type(operator.document()), NodeType::Comment);
}

#[test]
fn update() {
    let mut doc = api_manager();
    let expected = doc.build_config("Username", "admin", Vec::<(&str, &str)>::new());
    let mut operator = doc.operator();
    assert!(operator.update_config("//AuthManager/Username", expected).unwrap());
    let config = operator.get_config("//AuthManager/Username").unwrap().unwrap();
    assert_eq!(doc.config(config), doc.config(expected));
    // the other Username is untouched
    let gateway_user = doc.select("//Environment/Username").unwrap()[0];
    assert_eq!(gateway_user.text_content(&doc), "${admin.username}");
}

#[test]
fn update_not_found() {
    let mut doc = api_manager();
    let expected = doc.build_config("Username", "admin", Vec::<(&str, &str)>::new());
    let mut operator = doc.operator();
    assert!(!operator.update_config("//AuthManager/UsernameS", expected).unwrap());
    let config = operator.get_config("//AuthManager/Username").unwrap().unwrap();
    assert_eq!(config.text_content(operator.document()), "${admin.username}");
}

#[test]
fn update_equivalent_paths() {
    let paths = [
        "/APIManager/APIGateway/Environments/Environment/Password",
        "//Environments/Environment/Password",
    ];
    let results: Vec<String> = paths
        .iter()
        .map(|path| {
            let mut doc = api_manager();
            let new = doc
                .create_config(r#"<Password encrypted="true">xsaxlj</Password>"#)
                .unwrap();
            assert!(doc.operator().update_config(path, new).unwrap());
            doc.write_str().unwrap()
        })
        .collect();
    assert_eq!(results[0], results[1]);
    assert!(results[0].contains(r#"<Password encrypted="true">xsaxlj</Password>"#));
}

#[test]
fn add_before_comment() {
    let mut doc = api_manager();
    let parent = "//APIConsumerAuthentication";
    let anchor = "//APIConsumerAuthentication/comment()[contains(., 'ConsumerDialectURI')]";
    let child_position = position_of(&doc, anchor);
    let original = siblings(&doc, parent);

    let new = doc.build_config("ClaimsRetrieverImplClass", CLAIMS_RETRIEVER, Vec::<(&str, &str)>::new());
    assert!(doc.operator().add_config(anchor, new, Position::Before).unwrap());
    assert!(doc
        .operator()
        .config_exists("//APIConsumerAuthentication/ClaimsRetrieverImplClass")
        .unwrap());

    let updated = siblings(&doc, parent);
    assert_eq!(updated.len(), original.len() + 1);
    assert_eq!(&updated[..child_position], &original[..child_position]);
    assert_eq!(
        updated[child_position],
        (
            NodeType::Element,
            "ClaimsRetrieverImplClass".to_string(),
            CLAIMS_RETRIEVER.to_string()
        )
    );
    assert_eq!(&updated[child_position + 1..], &original[child_position..]);
}

#[test]
fn add_after_comment() {
    let mut doc = api_manager();
    let parent = "//APIConsumerAuthentication";
    let anchor = "//APIConsumerAuthentication/comment()[contains(., 'ClaimsRetrieverImplClass')]";
    let child_position = position_of(&doc, anchor) + 1;
    let original = siblings(&doc, parent);

    let new = doc
        .create_config(&format!(
            "<ClaimsRetrieverImplClass>{}</ClaimsRetrieverImplClass>",
            CLAIMS_RETRIEVER
        ))
        .unwrap();
    assert!(doc.operator().add_config(anchor, new, Position::After).unwrap());

    let updated = siblings(&doc, parent);
    assert_eq!(updated.len(), original.len() + 1);
    assert_eq!(&updated[..child_position], &original[..child_position]);
    assert_eq!(updated[child_position].1, "ClaimsRetrieverImplClass");
    assert_eq!(&updated[child_position + 1..], &original[child_position..]);
}

#[test]
fn add_at() {
    let mut doc = api_manager();
    let parent = "//APIConsumerAuthentication";
    let original = siblings(&doc, parent);
    let new = doc.build_config("APIMClaimCacheExpiry", "600", vec![("unit", "seconds")]);

    assert!(doc.operator().add_config(parent, new, Position::At).unwrap());
    let config = doc
        .operator()
        .get_config("//APIConsumerAuthentication/APIMClaimCacheExpiry")
        .unwrap()
        .unwrap();
    assert_eq!(doc.config(config), doc.config(new));

    let updated = siblings(&doc, parent);
    assert_eq!(&updated[..original.len()], &original[..]);
    assert_eq!(updated.len(), original.len() + 1);
    assert_eq!(updated.last().unwrap().2, "600");
}

#[test]
fn add_not_found() {
    let mut doc = api_manager();
    let new = doc.build_config("Rubbish", "x", Vec::<(&str, &str)>::new());
    let mut operator = doc.operator();
    for position in [Position::Before, Position::At, Position::After].iter() {
        assert!(!operator.add_config("//AuthManager/UsernameS", new, *position).unwrap());
    }
    assert_eq!(operator.get_config("//AuthManager/Rubbish").unwrap(), None);
}

#[test]
fn add_root() {
    for mut doc in vec![api_manager(), comments()] {
        let before = doc.write_str().unwrap();
        for position in [Position::Before, Position::At, Position::After].iter() {
            let new = doc.build_config("ClaimsRetrieverImplClass", CLAIMS_RETRIEVER, Vec::<(&str, &str)>::new());
            let mut operator = doc.operator();
            assert!(!operator.add_config("/", new, *position).unwrap());
            let root = operator.get_config("/").unwrap().unwrap();
            assert_ne!(root.name(operator.document()), "ClaimsRetrieverImplClass");
        }
        assert_eq!(doc.root_element().unwrap().name(&doc), "APIManager");
        assert_eq!(doc.write_str().unwrap(), before);
    }
}

#[test]
fn remove() {
    let mut doc = api_manager();
    let parent = "//AuthManager";
    let child_position = position_of(&doc, "//AuthManager/Username");
    let original = siblings(&doc, parent);

    assert!(doc.operator().remove_config("//AuthManager/Username").unwrap());
    assert_eq!(doc.operator().get_config("//AuthManager/Username").unwrap(), None);

    let updated = siblings(&doc, parent);
    assert_eq!(updated.len(), original.len() - 1);
    assert_eq!(&updated[..child_position], &original[..child_position]);
    assert_eq!(&updated[child_position..], &original[child_position + 1..]);
}

#[test]
fn remove_not_found() {
    let mut doc = api_manager();
    let original = siblings(&doc, "//AuthManager");
    assert!(!doc.operator().remove_config("//AuthManager/UsernameS").unwrap());
    assert_eq!(siblings(&doc, "//AuthManager"), original);
}

#[test]
fn remove_root() {
    for mut doc in vec![api_manager(), comments()] {
        let mut operator = doc.operator();
        assert!(!operator.remove_config("/").unwrap());
        assert!(!operator.remove_config("/APIManager").unwrap());
        assert_eq!(doc.root_element().unwrap().name(&doc), "APIManager");
    }
}

#[test]
fn round_trip_add_then_get() {
    let mut doc = api_manager();
    let attributes = vec![("enabled", "true"), ("scope", "global")];
    let new = doc.build_config("TokenRevocation", "notify", attributes);
    assert!(doc.operator().add_config("//CacheConfigurations", new, Position::At).unwrap());
    let found = doc
        .operator()
        .get_config("//CacheConfigurations/TokenRevocation")
        .unwrap()
        .unwrap();
    assert_eq!(found, Item::Node(new));
    assert_eq!(doc.config(found), doc.config(new));
}

#[test]
fn foreign_node_is_rejected() {
    let mut doc = api_manager();
    let mut other = Document::new();
    let foreign = other.build_config("Username", "admin", Vec::<(&str, &str)>::new());
    let mut operator = doc.operator();
    assert!(matches!(
        operator.add_config("//AuthManager", foreign, Position::At),
        Err(Error::WrongDocument)
    ));
    let imported = doc.import_node(&other, foreign).unwrap();
    assert!(doc.operator().update_config("//AuthManager/Username", imported).unwrap());
    let detached = Node::build("Detached").finish(&mut doc);
    assert!(doc.operator().add_config("//AuthManager", detached, Position::At).unwrap());
}
