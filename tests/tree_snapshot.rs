//! Snapshot of the rendered tree map for a small mixed project.

mod util;

use assert_fs::prelude::*;
use ctxpack::core::tree::render_tree;
use ctxpack::simulate;

#[test]
fn tree_map_snapshot()
{
    let tmp = util::make_python_fixture();
    tmp.child("src/store.py")
        .write_str(
            "class Store:\n\
             \x20   def get(self, key):\n\
             \x20       return None\n\
             \x20   def put(self, key, value):\n\
             \x20       pass\n\
             \n\
             def open_store(path):\n\
             \x20   return Store()\n",
        )
        .unwrap();
    tmp.child("assets/logo.png")
        .write_binary(&[0x89, 0x50, 0x4e, 0x47])
        .unwrap();

    let cfg = util::config_for(tmp.path());
    let result = simulate(&cfg).expect("simulate");
    let tree = render_tree(&result.file_records, &cfg.tree);

    insta::assert_snapshot!(tree, @r"
├── README.md
├── src
│   ├── app.py
│   │   class Foo
│   │     method bar(self)
│   └── store.py
│       class Store
│         method get(self, key)
│         method put(self, key, value)
│       function open_store(path)
└── tests
    └── test_app.py
        function test_bar()
");
}

#[test]
fn classes_hidden_flattens_methods()
{
    let tmp = util::make_python_fixture();
    let mut cfg = util::config_for(tmp.path());
    cfg.tree.show_classes = false;
    cfg.tree.show_functions = false;

    let result = simulate(&cfg).expect("simulate");
    let tree = render_tree(&result.file_records, &cfg.tree);

    insta::assert_snapshot!(tree, @r"
├── README.md
├── src
│   └── app.py
│       method bar(self)
└── tests
    └── test_app.py
");
}
